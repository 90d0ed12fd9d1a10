pub mod aggregate;
pub mod command;
pub mod discovery;
pub mod file;
pub mod report;
pub mod runner;
pub mod sanitize;
pub mod selection;
pub mod system;
pub mod template;
