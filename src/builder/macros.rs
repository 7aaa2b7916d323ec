//! Macros for ergonomic state machine construction.

/// Declare an enum whose variants are the states of a machine, in order.
///
/// The enum converts into [`StateRef`](crate::core::StateRef) by ordinal and
/// exposes the state names for the builder.
///
/// # Example
///
/// ```
/// use heartwood::{state_enum, StateMachine, StateMachineBuilder};
///
/// state_enum! {
///     pub enum Door {
///         Closed,
///         Open,
///         Locked,
///     }
/// }
///
/// let mut machine: StateMachine = StateMachineBuilder::new()
///     .states(Door::NAMES)
///     .initial(Door::Locked)
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.state(), Some(Door::Locked.id()));
/// machine.transition(Door::Closed).unwrap();
/// assert!(machine.is([Door::Closed, Door::Open]).unwrap());
/// assert_eq!(machine.state().and_then(Door::from_id), Some(Door::Closed));
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        #[allow(dead_code)]
        impl $name {
            /// State names in declaration order.
            pub const NAMES: &'static [&'static str] = &[$(stringify!($variant)),*];

            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            pub fn name(self) -> &'static str {
                Self::NAMES[self.id().index()]
            }

            pub fn id(self) -> $crate::core::StateId {
                $crate::core::StateId(self as usize)
            }

            pub fn from_id(id: $crate::core::StateId) -> Option<Self> {
                Self::ALL.get(id.index()).copied()
            }
        }

        impl From<$name> for $crate::core::StateRef {
            fn from(state: $name) -> Self {
                $crate::core::StateRef::Index(state as usize)
            }
        }
    };
}
