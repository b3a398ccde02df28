//! Internal macros for reducing state boilerplate.

/// Implement `FromRef<AppState>` for a field of the application state so
/// handlers can extract exactly the piece they need.
#[macro_export]
macro_rules! impl_from_ref {
    ($ty:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $ty {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
