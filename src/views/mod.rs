pub mod chat;
pub mod knowledge;
pub mod navigation;
pub mod settings;
