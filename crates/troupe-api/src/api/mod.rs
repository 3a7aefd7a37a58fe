// HTTP surface modules

pub mod activities;
pub mod agents;
pub mod commands;
pub mod common;
pub mod events;
pub mod github;
pub mod identities;
pub mod records;
pub mod status;
pub mod tasks;
pub mod teams;
pub mod workflows;
pub mod workspaces;
