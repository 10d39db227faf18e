//! Plugin ABI (§9 "Plugin ABI").
//!
//! A plugin is described by a C-style method table of function pointers —
//! `instantiate`/`connect_port`/`activate`/`run`/`deactivate`/`cleanup`, the
//! same shape real LV2 binaries expose — rather than a Rust trait object,
//! so that plugins loaded from outside this process (a dynamic library, or
//! eventually a different language entirely) can be hosted without this
//! crate knowing their concrete type. [`Instance`] is the one place that
//! reconstitutes the opaque handle the table hands back, and is therefore
//! the one place in this crate with a justified `unsafe` block: everywhere
//! else, a plugin is just a value behind this table.
//!
//! In-process Rust plugins implement [`Plugin`] and get a table generated
//! for them by [`descriptor_for`], so the unsafe boundary never leaks into
//! ordinary plugin authors' code.

use std::ffi::c_void;

/// Opaque per-instance handle, analogous to `LV2_Handle`. Only ever
/// produced by a descriptor's own `instantiate` and only ever passed back
/// into that same descriptor's other functions.
pub type Handle = *mut c_void;

/// A plugin's raw method table. All function pointers are mandatory except
/// `extension_data`, which plugins without optional extensions may omit.
#[derive(Clone, Copy)]
pub struct Descriptor {
    pub uri: &'static str,
    pub instantiate: fn(sample_rate: f64) -> Handle,
    pub connect_port: fn(Handle, u32, *mut f32),
    pub activate: fn(Handle),
    pub run: fn(Handle, u32),
    pub deactivate: fn(Handle),
    pub cleanup: fn(Handle),
    pub extension_data: Option<fn(&str) -> Option<*const c_void>>,
}

/// A safe, in-process plugin implementation. [`descriptor_for`] wraps any
/// `Plugin` type in a [`Descriptor`] so it can be hosted through the same
/// path as an externally loaded one.
pub trait Plugin: Send {
    fn new(sample_rate: f64) -> Self
    where
        Self: Sized;
    fn connect_port(&mut self, port_index: u32, data: *mut f32);
    fn activate(&mut self) {}
    fn run(&mut self, sample_count: u32);
    fn deactivate(&mut self) {}
}

/// Builds a [`Descriptor`] for an in-process `Plugin` type `P`.
///
/// # Safety boundary
/// The returned table's `instantiate` boxes a `P` and leaks its pointer as
/// the opaque `Handle`; every other function immediately casts that
/// `Handle` back to `*mut P` before dereferencing it. This is sound only
/// because every call into the table for a given instance is guaranteed
/// (by [`Instance`], the table's sole caller in this crate) to use the
/// exact handle `instantiate` returned for that instance, and `cleanup` is
/// called at most once.
#[must_use]
pub fn descriptor_for<P: Plugin + 'static>(uri: &'static str) -> Descriptor {
    Descriptor {
        uri,
        instantiate: |sample_rate| {
            let boxed: Box<P> = Box::new(P::new(sample_rate));
            Box::into_raw(boxed).cast::<c_void>()
        },
        connect_port: |handle, index, data| {
            // SAFETY: see the `descriptor_for` safety boundary note above.
            let plugin = unsafe { &mut *handle.cast::<P>() };
            plugin.connect_port(index, data);
        },
        activate: |handle| {
            // SAFETY: see the `descriptor_for` safety boundary note above.
            let plugin = unsafe { &mut *handle.cast::<P>() };
            plugin.activate();
        },
        run: |handle, n| {
            // SAFETY: see the `descriptor_for` safety boundary note above.
            let plugin = unsafe { &mut *handle.cast::<P>() };
            plugin.run(n);
        },
        deactivate: |handle| {
            // SAFETY: see the `descriptor_for` safety boundary note above.
            let plugin = unsafe { &mut *handle.cast::<P>() };
            plugin.deactivate();
        },
        cleanup: |handle| {
            // SAFETY: see the `descriptor_for` safety boundary note above;
            // `cleanup` reclaims ownership and is called at most once.
            drop(unsafe { Box::from_raw(handle.cast::<P>()) });
        },
        extension_data: None,
    }
}

/// An instantiated plugin: a descriptor plus the opaque handle it produced.
/// Owns the handle's lifetime — `cleanup` runs on drop.
pub struct Instance {
    descriptor: Descriptor,
    handle: Handle,
}

// SAFETY: the handle is only ever touched through the descriptor's own
// functions, which for in-process plugins (the only kind this crate
// constructs today) require `P: Plugin + Send`. An externally loaded
// descriptor is trusted by the host operator the same way a dynamically
// loaded LV2 binary is.
unsafe impl Send for Instance {}

impl Instance {
    #[must_use]
    pub fn new(descriptor: Descriptor, sample_rate: f64) -> Self {
        let handle = (descriptor.instantiate)(sample_rate);
        Self { descriptor, handle }
    }

    pub fn connect_port(&mut self, port_index: u32, data: *mut f32) {
        (self.descriptor.connect_port)(self.handle, port_index, data);
    }

    pub fn activate(&mut self) {
        (self.descriptor.activate)(self.handle);
    }

    pub fn run(&mut self, sample_count: u32) {
        (self.descriptor.run)(self.handle, sample_count);
    }

    pub fn deactivate(&mut self) {
        (self.descriptor.deactivate)(self.handle);
    }

    #[must_use]
    pub fn uri(&self) -> &'static str {
        self.descriptor.uri
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        (self.descriptor.cleanup)(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain {
        factor: f32,
        input: *const f32,
        output: *mut f32,
    }

    impl Plugin for Gain {
        fn new(_sample_rate: f64) -> Self {
            Self {
                factor: 2.0,
                input: std::ptr::null(),
                output: std::ptr::null_mut(),
            }
        }

        fn connect_port(&mut self, port_index: u32, data: *mut f32) {
            match port_index {
                0 => self.input = data,
                1 => self.output = data,
                _ => {}
            }
        }

        fn run(&mut self, sample_count: u32) {
            // SAFETY: test-only; both pointers are connected to live slices
            // below before `run` is called, matching real-host usage.
            unsafe {
                for i in 0..sample_count as usize {
                    *self.output.add(i) = *self.input.add(i) * self.factor;
                }
            }
        }
    }

    #[test]
    fn descriptor_round_trips_through_instantiate_and_cleanup() {
        let descriptor = descriptor_for::<Gain>("urn:test:gain");
        let mut instance = Instance::new(descriptor, 48_000.0);

        let input = [1.0f32, 2.0, 3.0, 4.0];
        let mut output = [0.0f32; 4];
        instance.connect_port(0, input.as_ptr().cast_mut());
        instance.connect_port(1, output.as_mut_ptr());
        instance.activate();
        instance.run(4);
        instance.deactivate();

        assert_eq!(output, [2.0, 4.0, 6.0, 8.0]);
        assert_eq!(instance.uri(), "urn:test:gain");
    }

    #[test]
    fn instance_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Instance>();
    }
}
