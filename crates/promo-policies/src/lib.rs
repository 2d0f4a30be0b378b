//! promo-policies: decisión de promoción de modelos.
//!
//! `PromotionDecider` implementa la máquina de estados
//! NotFound -> creado con primera versión; sin versiones -> primera versión;
//! con versión vigente -> comparar -> {registrada, sin cambios}. La
//! comparación la delega en una `PromotionPolicy` y la secuencia
//! leer/comparar/registrar corre bajo el lock del nombre del modelo.

mod decider;
mod locks;
mod policy;

pub use decider::PromotionDecider;
pub use locks::ModelLocks;
pub use policy::{params_hash, PolicyParams, PromotionPolicy, StrictImprovementPolicy};
