pub mod init;
pub mod systems;
pub mod prelude {
    pub use super::init::*;
    pub use super::systems::*;
}
