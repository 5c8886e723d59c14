pub mod models;
pub mod schema;

pub mod data;
pub mod gateway;
pub mod universe;

pub mod config;
pub mod errors;
pub mod mediator;
pub mod players;
pub mod routing;
pub mod rpc;
pub mod ship_controller;
pub mod supervisor;
pub mod util;
pub mod workflows;
