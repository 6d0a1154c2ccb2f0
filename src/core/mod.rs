pub mod campaign;
pub mod deck;
pub mod dialogue;
pub mod graveyard;
pub mod interpreter;
pub mod ports;
pub mod registry;
pub mod session;
pub mod templater;
