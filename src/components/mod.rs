pub mod history;
pub mod text_overlay;
pub mod tools;
