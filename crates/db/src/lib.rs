pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_demo_trips, SeedResult};
pub use repositories::{
    InMemoryInventory, RepositoryError, Session, SessionFactory, SqlSession, SqlSessionFactory,
};
