pub mod driver;
pub mod format;
pub mod frontend;
pub mod impl_cmd;
pub mod init;
pub mod logging;
pub mod lsp;
pub mod package;
