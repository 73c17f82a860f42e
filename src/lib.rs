pub mod automata_config;
pub mod errors;
pub mod logging;
pub mod studio;
