pub mod init;
pub mod script;
pub mod serve;
pub mod session;
pub mod token;
