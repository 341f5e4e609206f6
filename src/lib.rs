pub mod clock;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod playback;
pub mod player;
pub mod sensor;
pub mod server;
pub mod session;
pub mod state;
