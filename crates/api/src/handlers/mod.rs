pub mod entities;
pub mod migration;
