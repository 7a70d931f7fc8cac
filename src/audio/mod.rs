//! Núcleo de reproducción por guild: cola, reproductor con loop de fondo y
//! registro de reproductores.

pub mod player;
pub mod queue;
pub mod registry;
pub mod track;

pub use player::{EnqueueOutcome, GuildPlayer, LoopMode, PlayerSession};
pub use queue::PlaybackQueue;
pub use registry::PlayerRegistry;
pub use track::{Track, TrackMetadata};
