//! Macro para declarar artifacts tipados sin boilerplate.
//!
//! Exportada en la raíz del crate: `use promo_core::typed_artifact;`

/// Declara un Artifact tipado con derives y `ArtifactSpec`.
///
/// Formas soportadas:
/// - `typed_artifact!(Name { field1: Ty1, field2: Ty2 });` // KIND = GenericJson
/// - `typed_artifact!(Name { field1: Ty1 } kind: $kind_expr);`
#[macro_export]
macro_rules! typed_artifact {
    ($name:ident { $($fname:ident : $fty:ty),+ $(,)? } kind: $kind:expr) => {
        #[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
        pub struct $name { $(pub $fname: $fty,)+ pub schema_version: u32 }
        impl $crate::model::ArtifactSpec for $name {
            const KIND: $crate::model::ArtifactKind = $kind;
        }
    };
    ($name:ident { $($fname:ident : $fty:ty),+ $(,)? }) => {
        $crate::typed_artifact!($name { $($fname : $fty),+ } kind: $crate::model::ArtifactKind::GenericJson);
    };
}
