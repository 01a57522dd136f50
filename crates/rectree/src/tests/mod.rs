mod cursor_tests;
mod frame_tests;
mod helpers;
