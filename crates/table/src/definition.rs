//! The XML definition sidecar.
//!
//! Layout, a fixed two-level tree of attributed elements:
//!
//! ```text
//! <TABLE_DEFINITION>
//!   <FIELD_DEFS>
//!     <FIELD NAME="..." TYPE="1" PRIMARY="Y" NOT_NULL="N" REFERENCE=""/>
//!   </FIELD_DEFS>
//!   <INDICES>
//!     <INDEX NAME="...">
//!       <FIELD .../>
//!     </INDEX>
//!   </INDICES>
//! </TABLE_DEFINITION>
//! ```

use crate::TableError;
use codec::{FieldDefinition, FieldDefinitions, FieldType};
use roxmltree::{Document, Node};
use std::fmt::Write as _;

/// A parsed definition: the table schema plus `(name, schema)` per index.
pub(crate) struct ParsedDefinition {
    pub fields: FieldDefinitions,
    pub indices: Vec<(String, FieldDefinitions)>,
}

pub(crate) fn parse_definition(text: &str) -> Result<ParsedDefinition, TableError> {
    let doc = Document::parse(text).map_err(|e| TableError::Definition(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "TABLE_DEFINITION" {
        return Err(TableError::Definition(format!(
            "unexpected root element {}",
            root.tag_name().name()
        )));
    }

    let field_defs = root
        .children()
        .find(|n| n.has_tag_name("FIELD_DEFS"))
        .ok_or_else(|| TableError::Definition("missing FIELD_DEFS".to_string()))?;
    let fields = parse_fields(&field_defs)?;

    let mut indices = Vec::new();
    if let Some(index_defs) = root.children().find(|n| n.has_tag_name("INDICES")) {
        for index in index_defs.children().filter(|n| n.has_tag_name("INDEX")) {
            let name = index
                .attribute("NAME")
                .ok_or_else(|| TableError::Definition("INDEX without NAME".to_string()))?;
            indices.push((name.to_string(), parse_fields(&index)?));
        }
    }

    Ok(ParsedDefinition { fields, indices })
}

fn parse_fields(parent: &Node<'_, '_>) -> Result<FieldDefinitions, TableError> {
    let mut fields = Vec::new();
    for field in parent.children().filter(|n| n.has_tag_name("FIELD")) {
        let name = field
            .attribute("NAME")
            .ok_or_else(|| TableError::Definition("FIELD without NAME".to_string()))?;
        let tag: u32 = field
            .attribute("TYPE")
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| TableError::Definition(format!("field {name}: bad TYPE")))?;
        let field_type = FieldType::from_tag(tag)
            .ok_or_else(|| TableError::Definition(format!("field {name}: unknown TYPE {tag}")))?;

        let mut def = FieldDefinition::new(
            name,
            field_type,
            field.attribute("PRIMARY") == Some("Y"),
            field.attribute("NOT_NULL") == Some("Y"),
        );
        def.reference = field.attribute("REFERENCE").unwrap_or("").to_string();
        fields.push(def);
    }
    Ok(fields)
}

pub(crate) fn render_definition(
    fields: &FieldDefinitions,
    indices: &[(String, &FieldDefinitions)],
) -> String {
    let mut out = String::new();
    out.push_str("<TABLE_DEFINITION>\n");

    out.push_str("  <FIELD_DEFS>\n");
    for def in fields {
        render_field(&mut out, "    ", def);
    }
    out.push_str("  </FIELD_DEFS>\n");

    out.push_str("  <INDICES>\n");
    for (name, defs) in indices {
        let _ = writeln!(out, "    <INDEX NAME=\"{}\">", escape(name));
        for def in defs.iter() {
            render_field(&mut out, "      ", def);
        }
        out.push_str("    </INDEX>\n");
    }
    out.push_str("  </INDICES>\n");

    out.push_str("</TABLE_DEFINITION>\n");
    out
}

fn render_field(out: &mut String, indent: &str, def: &FieldDefinition) {
    let _ = writeln!(
        out,
        "{indent}<FIELD NAME=\"{}\" TYPE=\"{}\" PRIMARY=\"{}\" NOT_NULL=\"{}\" REFERENCE=\"{}\"/>",
        escape(&def.name),
        def.field_type.tag(),
        if def.primary { "Y" } else { "N" },
        if def.not_null { "Y" } else { "N" },
        escape(&def.reference),
    );
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
