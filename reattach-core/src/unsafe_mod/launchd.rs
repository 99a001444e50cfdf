//! # Runtime-Resolved launchd Bindings
//!
//! The routines used to move between bootstrap namespaces are private to
//! libSystem and change signature between releases, so none of them are
//! linked. Each one is looked up with `dlsym` when it is needed; a missing
//! symbol becomes [`MigrationError::EntryPointNotFound`] instead of a load
//! failure. On hosts without launchd every lookup simply misses.

use crate::errors::{KernReturn, MigrationError, ProtocolStep};
use crate::mechanism::Launchd;
use crate::session::MachPort;
use nix::unistd::Uid;
use std::ffi::{CStr, CString, c_void};
use std::ptr;

/// Raw signatures of the resolved entry points.
mod ffi {
    use std::ffi::{c_char, c_int, c_uint, c_void};

    pub type MachPortT = u32;
    pub type KernReturnT = c_int;
    pub type UidT = u32;
    pub type VprocErr = *mut c_void;
    pub type XpcObject = *mut c_void;

    pub const KERN_SUCCESS: KernReturnT = 0;

    /// `VPROC_GSK_MGR_NAME` from `vproc_priv.h`.
    pub const VPROC_GSK_MGR_NAME: c_int = 6;

    pub type MoveSubsetToUser = unsafe extern "C" fn(UidT, *const c_char) -> VprocErr;
    pub type MoveSubsetToUserFlags = unsafe extern "C" fn(UidT, *const c_char, u64) -> VprocErr;
    pub type DetachFromConsole = unsafe extern "C" fn(c_uint) -> VprocErr;
    pub type VprocSwapString =
        unsafe extern "C" fn(*mut c_void, c_int, *const c_char, *mut *mut c_char) -> VprocErr;

    pub type BootstrapGetRoot = unsafe extern "C" fn(MachPortT, *mut MachPortT) -> KernReturnT;
    pub type BootstrapLookUpPerUser =
        unsafe extern "C" fn(MachPortT, *const c_char, UidT, *mut MachPortT) -> KernReturnT;

    pub type TaskSetBootstrapPort = unsafe extern "C" fn(MachPortT, MachPortT) -> KernReturnT;
    pub type MachPortDeallocate = unsafe extern "C" fn(MachPortT, MachPortT) -> KernReturnT;

    pub type XpcDictionaryCreate =
        unsafe extern "C" fn(*const *const c_char, *const XpcObject, usize) -> XpcObject;
    pub type XpcDictionarySetUint64 = unsafe extern "C" fn(XpcObject, *const c_char, u64);
    pub type XpcDictionaryGetUint64 = unsafe extern "C" fn(XpcObject, *const c_char) -> u64;
    pub type XpcDictionaryCopyMachSend =
        unsafe extern "C" fn(XpcObject, *const c_char) -> MachPortT;
    pub type XpcPipeCreateFromPort = unsafe extern "C" fn(MachPortT, c_int) -> XpcObject;
    pub type XpcPipeRoutine =
        unsafe extern "C" fn(XpcObject, XpcObject, *mut XpcObject) -> c_int;
    pub type XpcRelease = unsafe extern "C" fn(XpcObject);
}

/// Looks up `$name` and casts it to the function type `$ty`, returning
/// `EntryPointNotFound` from the enclosing function if it is missing.
macro_rules! find_symbol {
    ($name:literal as $ty:ty) => {{
        let sym = lookup(concat!($name, "\0"))
            .ok_or(MigrationError::EntryPointNotFound { symbol: $name })?;
        // SAFETY: the symbol was exported under this name, and `$ty` is the
        // signature libSystem uses for it on the releases that select it.
        unsafe { std::mem::transmute::<*mut c_void, $ty>(sym) }
    }};
}

/// Looks up a NUL-terminated symbol name in every loaded image.
fn lookup(name_with_nul: &'static str) -> Option<*mut c_void> {
    // SAFETY: the name is NUL-terminated and 'static.
    let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name_with_nul.as_ptr().cast()) };
    (!sym.is_null()).then_some(sym)
}

/// Looks up an exported variable holding a port name.
fn port_variable(
    name_with_nul: &'static str,
    symbol: &'static str,
) -> Result<*mut ffi::MachPortT, MigrationError> {
    lookup(name_with_nul)
        .map(|sym| sym.cast::<ffi::MachPortT>())
        .ok_or(MigrationError::EntryPointNotFound { symbol })
}

fn mach_task_self() -> Result<ffi::MachPortT, MigrationError> {
    let task = port_variable("mach_task_self_\0", "mach_task_self_")?;
    // SAFETY: `mach_task_self_` is an initialised `mach_port_t` in libSystem.
    Ok(unsafe { task.read() })
}

fn step_failed(step: ProtocolStep, symbol: &'static str, code: KernReturn) -> MigrationError {
    MigrationError::ProtocolStepFailed { step, symbol, code }
}

/// Building or sending the XPC request is part of the per-user lookup.
fn request_failed(symbol: &'static str, code: KernReturn) -> MigrationError {
    step_failed(ProtocolStep::PerUserLookup, symbol, code)
}

/// The code reported for a failed pipe routine. The reply's `error` field
/// wins over the routine's own return; values past `i32::MAX` saturate.
fn pipe_error_code(rc: i32, error: u64) -> KernReturn {
    if error != 0 {
        i32::try_from(error).unwrap_or(i32::MAX)
    } else {
        rc
    }
}

fn session_name(session: &str) -> Result<CString, MigrationError> {
    CString::new(session).map_err(|_| MigrationError::CallRejected {
        symbol: "_vprocmgr_move_subset_to_user",
    })
}

/// An XPC object released when dropped.
struct XpcGuard {
    obj: ffi::XpcObject,
    release: ffi::XpcRelease,
}

impl Drop for XpcGuard {
    fn drop(&mut self) {
        if !self.obj.is_null() {
            // SAFETY: `obj` is a retained XPC object we own.
            unsafe { (self.release)(self.obj) }
        }
    }
}

/// The real [`Launchd`], backed by libSystem.
#[derive(Debug, Default)]
pub struct SystemLaunchd;

impl SystemLaunchd {
    /// Creates the binding. Nothing is resolved until a method is called.
    pub fn new() -> Self {
        Self
    }
}

impl Launchd for SystemLaunchd {
    fn move_subset_to_user(&self, uid: Uid, session: &str) -> Result<(), MigrationError> {
        let f = find_symbol!("_vprocmgr_move_subset_to_user" as ffi::MoveSubsetToUser);
        let session = session_name(session)?;
        // SAFETY: 10.5 signature, valid C string.
        let err = unsafe { f(uid.as_raw(), session.as_ptr()) };
        if !err.is_null() {
            return Err(MigrationError::CallRejected {
                symbol: "_vprocmgr_move_subset_to_user",
            });
        }
        Ok(())
    }

    fn move_subset_to_user_with_flags(
        &self,
        uid: Uid,
        session: &str,
        flags: u64,
    ) -> Result<(), MigrationError> {
        let f = find_symbol!("_vprocmgr_move_subset_to_user" as ffi::MoveSubsetToUserFlags);
        let session = session_name(session)?;
        // SAFETY: 10.6 signature, valid C string.
        let err = unsafe { f(uid.as_raw(), session.as_ptr(), flags) };
        if !err.is_null() {
            return Err(MigrationError::CallRejected {
                symbol: "_vprocmgr_move_subset_to_user",
            });
        }
        Ok(())
    }

    fn manager_name(&self) -> Result<String, MigrationError> {
        let f = find_symbol!("vproc_swap_string" as ffi::VprocSwapString);
        let mut out: *mut std::ffi::c_char = ptr::null_mut();
        // SAFETY: a null vproc means "this process"; `out` receives a malloc'd string.
        let err = unsafe { f(ptr::null_mut(), ffi::VPROC_GSK_MGR_NAME, ptr::null(), &mut out) };
        if !err.is_null() || out.is_null() {
            return Err(step_failed(ProtocolStep::PropertyQuery, "vproc_swap_string", -1));
        }
        // SAFETY: `out` is a NUL-terminated string we now own.
        let name = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
        // SAFETY: `out` came from malloc in `vproc_swap_string` and is not used again.
        unsafe { libc::free(out.cast()) };
        Ok(name)
    }

    fn root_namespace(&self, bootstrap: MachPort) -> Result<MachPort, MigrationError> {
        let f = find_symbol!("bootstrap_get_root" as ffi::BootstrapGetRoot);
        let mut root: ffi::MachPortT = 0;
        // SAFETY: `root` is a valid out pointer.
        let kr = unsafe { f(bootstrap.0, &mut root) };
        if kr != ffi::KERN_SUCCESS {
            return Err(step_failed(ProtocolStep::RootLookup, "bootstrap_get_root", kr));
        }
        Ok(MachPort(root))
    }

    fn look_up_per_user(&self, root: MachPort, uid: Uid) -> Result<MachPort, MigrationError> {
        let f = find_symbol!("bootstrap_look_up_per_user" as ffi::BootstrapLookUpPerUser);
        let mut per_user: ffi::MachPortT = 0;
        // SAFETY: a null service name asks for the namespace itself.
        let kr = unsafe { f(root.0, ptr::null(), uid.as_raw(), &mut per_user) };
        if kr != ffi::KERN_SUCCESS {
            return Err(step_failed(
                ProtocolStep::PerUserLookup,
                "bootstrap_look_up_per_user",
                kr,
            ));
        }
        Ok(MachPort(per_user))
    }

    fn detach_from_console(&self) -> Result<(), MigrationError> {
        let f = find_symbol!("_vprocmgr_detach_from_console" as ffi::DetachFromConsole);
        // SAFETY: takes a flags word only.
        let err = unsafe { f(0) };
        if !err.is_null() {
            return Err(MigrationError::CallRejected {
                symbol: "_vprocmgr_detach_from_console",
            });
        }
        Ok(())
    }

    fn request_per_user_namespace(
        &self,
        bootstrap: MachPort,
        uid: Uid,
    ) -> Result<MachPort, MigrationError> {
        let create = find_symbol!("xpc_dictionary_create" as ffi::XpcDictionaryCreate);
        let set_u64 = find_symbol!("xpc_dictionary_set_uint64" as ffi::XpcDictionarySetUint64);
        let get_u64 = find_symbol!("xpc_dictionary_get_uint64" as ffi::XpcDictionaryGetUint64);
        let copy_send =
            find_symbol!("xpc_dictionary_copy_mach_send" as ffi::XpcDictionaryCopyMachSend);
        let pipe_create = find_symbol!("xpc_pipe_create_from_port" as ffi::XpcPipeCreateFromPort);
        let routine = find_symbol!("xpc_pipe_routine" as ffi::XpcPipeRoutine);
        let release = find_symbol!("xpc_release" as ffi::XpcRelease);

        // SAFETY: every call below follows the libxpc contracts; objects are
        // owned by guards and released on every path.
        unsafe {
            let request = XpcGuard {
                obj: create(ptr::null(), ptr::null(), 0),
                release,
            };
            if request.obj.is_null() {
                return Err(request_failed("xpc_dictionary_create", -1));
            }
            for (key, value) in [
                (c"subsystem", 0x3),
                (c"routine", 0x343),
                (c"handle", 0x0),
                (c"type", 0x1),
                (c"uid", u64::from(uid.as_raw())),
            ] {
                set_u64(request.obj, key.as_ptr(), value);
            }

            let pipe = XpcGuard {
                obj: pipe_create(bootstrap.0, 0),
                release,
            };
            if pipe.obj.is_null() {
                return Err(step_failed(
                    ProtocolStep::RootLookup,
                    "xpc_pipe_create_from_port",
                    -1,
                ));
            }

            let mut reply = XpcGuard {
                obj: ptr::null_mut(),
                release,
            };
            let rc = routine(pipe.obj, request.obj, &mut reply.obj);
            let error = if reply.obj.is_null() {
                0
            } else {
                get_u64(reply.obj, c"error".as_ptr())
            };
            if rc != 0 || error != 0 {
                let code = pipe_error_code(rc, error);
                return Err(request_failed("xpc_pipe_routine", code));
            }

            Ok(MachPort(copy_send(reply.obj, c"bootstrap".as_ptr())))
        }
    }

    fn current_bootstrap_port(&self) -> Result<MachPort, MigrationError> {
        let port = port_variable("bootstrap_port\0", "bootstrap_port")?;
        // SAFETY: `bootstrap_port` is an initialised `mach_port_t` in libSystem.
        Ok(MachPort(unsafe { port.read() }))
    }

    fn set_task_bootstrap_port(&self, port: MachPort) -> Result<(), MigrationError> {
        let f = find_symbol!("task_set_bootstrap_port" as ffi::TaskSetBootstrapPort);
        let task = mach_task_self()?;
        // SAFETY: plain mach call on our own task.
        let kr = unsafe { f(task, port.0) };
        if kr != ffi::KERN_SUCCESS {
            return Err(MigrationError::HandleInstallFailed { code: kr });
        }
        // Keep libSystem's cached copy in step with the task's special port.
        if let Ok(cached) = port_variable("bootstrap_port\0", "bootstrap_port") {
            // SAFETY: single-threaded, and the variable is a plain `mach_port_t`.
            unsafe { cached.write(port.0) };
        }
        Ok(())
    }

    fn deallocate_port(&self, port: MachPort) -> Result<(), MigrationError> {
        let f = find_symbol!("mach_port_deallocate" as ffi::MachPortDeallocate);
        let task = mach_task_self()?;
        // SAFETY: releases one send right we hold.
        let kr = unsafe { f(task, port.0) };
        if kr != ffi::KERN_SUCCESS {
            return Err(MigrationError::HandleReleaseFailed { code: kr });
        }
        Ok(())
    }
}
