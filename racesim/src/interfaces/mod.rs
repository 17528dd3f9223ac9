pub mod tui_interface;
