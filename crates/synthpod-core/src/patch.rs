//! The patch/UI protocol (§4.13).
//!
//! The UI never touches the graph directly — it sends `patch:Get`/`Set`/
//! `Put`/`Copy`/`Patch` requests over the message plane (§4.6), and the
//! application thread dispatches them against whatever implements
//! [`PatchTarget`] for the addressed subject (typically a module's control
//! ports or the engine's own top-level properties).
//!
//! [`EngineState`] gates which requests are accepted at all: a `Copy`
//! (full state dump) puts the engine into `Drain` until the dump
//! completes, during which further topology-mutating requests are
//! rejected rather than interleaved with an in-flight snapshot.

use crate::atom::Atom;
use crate::urid::Urid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// The response didn't fit in the space the caller reserved (§7).
    #[error("no space to encode response")]
    NoSpace,
    /// The request supplied a value of the wrong atom type for the target
    /// property.
    #[error("bad atom type for property")]
    BadType,
    /// A `Patch` request's add/remove flags were contradictory or absent.
    #[error("bad patch flags")]
    BadFlags,
    /// The target does not support this request kind (e.g. `Copy` against
    /// something with no serializable state).
    #[error("operation unsupported by target")]
    Unsupported,
    /// `subject` or `property` did not resolve to anything the target
    /// knows about.
    #[error("unknown subject or property")]
    Unknown,
    /// Applying the request would require an allocation that failed (or
    /// was refused because the engine is in `Drain`/`Block`).
    #[error("allocation failed applying patch")]
    FatalAlloc,
}

/// Gates which requests the dispatcher accepts right now (§4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Normal operation; every request kind is accepted.
    Run,
    /// A full-state `Copy` is in flight; topology edits are rejected until
    /// it completes so the dump is a consistent snapshot.
    Drain,
    /// Topology is locked (e.g. mid graph-order rebuild); all mutating
    /// requests are rejected, `Get` still answered.
    Block,
    /// Waiting on a worker job before a request can be completed (e.g. a
    /// `Set` that requires the plugin's worker interface to apply).
    Wait,
}

impl EngineState {
    #[must_use]
    pub fn accepts_mutation(self) -> bool {
        matches!(self, EngineState::Run)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchRequest {
    Get {
        subject: Option<Urid>,
        property: Option<Urid>,
    },
    Set {
        subject: Option<Urid>,
        property: Urid,
        value: Atom,
    },
    Put {
        subject: Option<Urid>,
        properties: Vec<(Urid, Atom)>,
    },
    Patch {
        subject: Option<Urid>,
        add: Vec<(Urid, Atom)>,
        remove: Vec<Urid>,
    },
    Copy {
        subject: Option<Urid>,
    },
}

/// Anything addressable by the patch protocol: a module's control ports,
/// the engine's own top-level properties, and so on.
pub trait PatchTarget {
    fn get_property(&self, property: Urid) -> Option<Atom>;
    fn set_property(&mut self, property: Urid, value: Atom) -> Result<(), PatchError>;
    /// All currently-set properties, for `Put`/`Copy` responses.
    fn all_properties(&self) -> Vec<(Urid, Atom)>;
}

/// Dispatches `request` against `target`, given the engine's current
/// `state`. Returns the response atom to publish back (a `patch:Get`
/// answer, or a `patch:Ack`-style `Object` for mutations).
pub fn dispatch(
    state: EngineState,
    target: &mut dyn PatchTarget,
    request: PatchRequest,
) -> Result<Atom, PatchError> {
    match request {
        PatchRequest::Get { property, .. } => {
            let Some(property) = property else {
                return Ok(Atom::Tuple(
                    target
                        .all_properties()
                        .into_iter()
                        .map(|(k, v)| Atom::Tuple(vec![Atom::Urid(k), v]))
                        .collect(),
                ));
            };
            target.get_property(property).ok_or(PatchError::Unknown)
        }
        PatchRequest::Set { property, value, .. } => {
            if !state.accepts_mutation() {
                return Err(PatchError::FatalAlloc);
            }
            target.set_property(property, value)?;
            Ok(Atom::Bool(true))
        }
        PatchRequest::Put { properties, .. } => {
            if !state.accepts_mutation() {
                return Err(PatchError::FatalAlloc);
            }
            for (key, value) in properties {
                target.set_property(key, value)?;
            }
            Ok(Atom::Bool(true))
        }
        PatchRequest::Patch { add, remove, .. } => {
            if !state.accepts_mutation() {
                return Err(PatchError::FatalAlloc);
            }
            if add.is_empty() && remove.is_empty() {
                return Err(PatchError::BadFlags);
            }
            for key in remove {
                // Removal is represented as setting back to a type-level
                // "unset" sentinel; targets that can't unset a property
                // reject it as Unsupported.
                target.set_property(key, Atom::Bool(false))?;
            }
            for (key, value) in add {
                target.set_property(key, value)?;
            }
            Ok(Atom::Bool(true))
        }
        PatchRequest::Copy { .. } => Ok(Atom::Tuple(
            target
                .all_properties()
                .into_iter()
                .map(|(k, v)| Atom::Tuple(vec![Atom::Urid(k), v]))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct FakeTarget {
        props: BTreeMap<u32, Atom>,
    }

    impl PatchTarget for FakeTarget {
        fn get_property(&self, property: Urid) -> Option<Atom> {
            self.props.get(&property.get()).cloned()
        }
        fn set_property(&mut self, property: Urid, value: Atom) -> Result<(), PatchError> {
            if !matches!(value, Atom::Float(_) | Atom::Bool(_)) {
                return Err(PatchError::BadType);
            }
            self.props.insert(property.get(), value);
            Ok(())
        }
        fn all_properties(&self) -> Vec<(Urid, Atom)> {
            self.props.iter().map(|(&k, v)| (Urid(k), v.clone())).collect()
        }
    }

    fn target() -> FakeTarget {
        let mut props = BTreeMap::new();
        props.insert(1, Atom::Float(0.5));
        FakeTarget { props }
    }

    #[test]
    fn get_known_property_returns_value() {
        let mut t = target();
        let result = dispatch(
            EngineState::Run,
            &mut t,
            PatchRequest::Get {
                subject: None,
                property: Some(Urid(1)),
            },
        )
        .unwrap();
        assert_eq!(result, Atom::Float(0.5));
    }

    #[test]
    fn get_unknown_property_is_unknown_error() {
        let mut t = target();
        let err = dispatch(
            EngineState::Run,
            &mut t,
            PatchRequest::Get {
                subject: None,
                property: Some(Urid(99)),
            },
        )
        .unwrap_err();
        assert_eq!(err, PatchError::Unknown);
    }

    #[test]
    fn set_rejected_outside_run_state() {
        let mut t = target();
        let err = dispatch(
            EngineState::Drain,
            &mut t,
            PatchRequest::Set {
                subject: None,
                property: Urid(1),
                value: Atom::Float(1.0),
            },
        )
        .unwrap_err();
        assert_eq!(err, PatchError::FatalAlloc);
    }

    #[test]
    fn set_with_wrong_type_is_bad_type() {
        let mut t = target();
        let err = dispatch(
            EngineState::Run,
            &mut t,
            PatchRequest::Set {
                subject: None,
                property: Urid(1),
                value: Atom::String("nope".into()),
            },
        )
        .unwrap_err();
        assert_eq!(err, PatchError::BadType);
    }

    #[test]
    fn patch_with_no_add_or_remove_is_bad_flags() {
        let mut t = target();
        let err = dispatch(
            EngineState::Run,
            &mut t,
            PatchRequest::Patch {
                subject: None,
                add: vec![],
                remove: vec![],
            },
        )
        .unwrap_err();
        assert_eq!(err, PatchError::BadFlags);
    }

    #[test]
    fn copy_returns_all_properties() {
        let mut t = target();
        let result = dispatch(
            EngineState::Run,
            &mut t,
            PatchRequest::Copy { subject: None },
        )
        .unwrap();
        match result {
            Atom::Tuple(items) => assert_eq!(items.len(), 1),
            _ => panic!("expected tuple"),
        }
    }
}
