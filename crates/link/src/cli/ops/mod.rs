pub mod connect;
pub mod id;
pub mod keygen;
pub mod version;

pub use connect::Connect;
pub use id::Id;
pub use keygen::Keygen;
pub use version::Version;
