pub mod bullet;
pub mod enemy;
pub mod pickup;
pub mod player;

pub use bullet::{Bullet, BulletSnapshot};
pub use enemy::{AiState, BotShot, Enemy, EnemySnapshot};
pub use pickup::{PowerUp, PowerUpSnapshot, WeaponPickup, WeaponPickupSnapshot};
pub use player::{Player, PlayerSnapshot};
