//! Murmur: a real-time presence and chat relay.
//!
//! Members connect over WebSocket, receive a welcome and the recent
//! conversation, and from then on see every message and membership change
//! in the room.

pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod presence;
pub mod user;
pub mod ws;
