// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Task handles and priorities for C callers.

use crate::{result_code, with_state, ULAPI_BAD_ARGS, ULAPI_ERROR};
use std::os::raw::{c_int, c_void};
use std::time::Duration;
use ulapi::{Error, Priority, Task, TaskContext};

/// Opaque handle to a task.
#[repr(C)]
pub struct UlapiTask {
    _private: [u8; 0],
}

/// C entry point: `void entry(void *arg)`.
pub type UlapiTaskEntry = extern "C" fn(arg: *mut c_void);

/// Caller-owned argument carried to the task thread.
struct SendPtr(*mut c_void);

// SAFETY: the caller of ulapi_task_start guarantees arg may be used from the
// new task.
unsafe impl Send for SendPtr {}

impl SendPtr {
    fn into_inner(self) -> *mut c_void {
        self.0
    }
}

unsafe fn task_ref<'a>(task: *mut UlapiTask) -> Option<&'a mut Task> {
    // SAFETY: caller guarantees task is NULL or came from ulapi_task_new.
    unsafe { task.cast::<Task>().as_mut() }
}

fn period_from_nsec(period_nsec: i64) -> Result<Option<Duration>, Error> {
    match u64::try_from(period_nsec) {
        Ok(0) => Ok(None),
        Ok(ns) => Ok(Some(Duration::from_nanos(ns))),
        Err(_) => Err(Error::BadArgs(format!("negative period {period_nsec}"))),
    }
}

// ============================================================================
// Handle lifecycle
// ============================================================================

/// Allocate an unstarted task handle.
///
/// # Safety
/// Release the handle with `ulapi_task_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_new() -> *mut UlapiTask {
    Box::into_raw(Box::new(Task::new())).cast::<UlapiTask>()
}

/// Free a task handle.
///
/// # Returns
/// `ULAPI_ERROR` while the task is still running; the handle stays valid.
///
/// # Safety
/// `task` must come from `ulapi_task_new` and not be used after `ULAPI_OK`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_delete(task: *mut UlapiTask) -> c_int {
    let Some(handle) = task_ref(task) else {
        return ULAPI_BAD_ARGS;
    };
    if !handle.is_finished() {
        log::debug!("[TASK] refusing to delete running task {}", handle.id());
        return ULAPI_ERROR;
    }
    let boxed = Box::from_raw(task.cast::<Task>());
    result_code(boxed.delete())
}

/// Start `task` running `entry(arg)` at priority `prio` (1 highest, 31 lowest).
///
/// `period_nsec` of 0 means aperiodic.
///
/// # Safety
/// - `task` must come from `ulapi_task_new`.
/// - `arg` must remain valid for as long as the task uses it.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_start(
    task: *mut UlapiTask,
    entry: Option<UlapiTaskEntry>,
    arg: *mut c_void,
    prio: c_int,
    period_nsec: i64,
) -> c_int {
    let (Some(handle), Some(entry)) = (task_ref(task), entry) else {
        return ULAPI_BAD_ARGS;
    };
    let prio = match u8::try_from(prio)
        .map_err(|_| Error::BadArgs(format!("priority {prio}")))
        .and_then(Priority::new)
    {
        Ok(p) => p,
        Err(e) => return result_code(Err(e)),
    };
    let period = match period_from_nsec(period_nsec) {
        Ok(p) => p,
        Err(e) => return result_code(Err(e)),
    };

    let arg = SendPtr(arg);
    result_code(with_state(|state| {
        state.ulapi.task_start(handle, prio, period, move |_ctx| {
            entry(arg.into_inner());
        })
    }))
}

/// Request cooperative stop.
///
/// # Safety
/// `task` must come from `ulapi_task_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_stop(task: *mut UlapiTask) -> c_int {
    let Some(handle) = task_ref(task) else {
        return ULAPI_BAD_ARGS;
    };
    result_code(with_state(|state| state.ulapi.task_stop(handle)))
}

/// Pause a task at its next checkpoint (`ULAPI_IMPL_ERROR` on the general-OS backend).
///
/// # Safety
/// `task` must come from `ulapi_task_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_pause(task: *mut UlapiTask) -> c_int {
    let Some(handle) = task_ref(task) else {
        return ULAPI_BAD_ARGS;
    };
    result_code(with_state(|state| state.ulapi.task_pause(handle)))
}

/// Resume a paused task (`ULAPI_IMPL_ERROR` on the general-OS backend).
///
/// # Safety
/// `task` must come from `ulapi_task_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_resume(task: *mut UlapiTask) -> c_int {
    let Some(handle) = task_ref(task) else {
        return ULAPI_BAD_ARGS;
    };
    result_code(with_state(|state| state.ulapi.task_resume(handle)))
}

/// Change a task's period (`ULAPI_IMPL_ERROR` on the general-OS backend).
///
/// # Safety
/// `task` must come from `ulapi_task_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_set_period(task: *mut UlapiTask, period_nsec: i64) -> c_int {
    let Some(handle) = task_ref(task) else {
        return ULAPI_BAD_ARGS;
    };
    result_code(
        period_from_nsec(period_nsec)
            .and_then(|period| with_state(|state| state.ulapi.task_set_period(handle, period))),
    )
}

/// Block until the task's entry point returns.
///
/// # Safety
/// `task` must come from `ulapi_task_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_join(task: *mut UlapiTask) -> c_int {
    let Some(handle) = task_ref(task) else {
        return ULAPI_BAD_ARGS;
    };
    result_code(handle.join())
}

// ============================================================================
// Calling task
// ============================================================================

/// Non-zero once a stop has been requested for the calling task.
///
/// Always 0 outside a ULAPI task.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_should_stop() -> c_int {
    TaskContext::current().map_or(0, |ctx| c_int::from(ctx.should_stop()))
}

/// Change the calling task's own period.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_self_set_period(period_nsec: i64) -> c_int {
    let Some(ctx) = TaskContext::current() else {
        return ULAPI_ERROR;
    };
    result_code(period_from_nsec(period_nsec).and_then(|period| ctx.set_period(period)))
}

/// OS identifier of the calling thread.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_task_id() -> u64 {
    ulapi::current_task_id()
}

/// Sleep one period less the configured offset.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_wait(period_nsec: i64) {
    let period = Duration::from_nanos(u64::try_from(period_nsec).unwrap_or(0));
    if with_state(|state| {
        state.ulapi.wait(period);
        Ok(())
    })
    .is_err()
    {
        ulapi::time::wait(period);
    }
}

// ============================================================================
// Priorities
// ============================================================================

/// Most urgent priority.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_prio_highest() -> c_int {
    c_int::from(Priority::highest().get())
}

/// Least urgent priority.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_prio_lowest() -> c_int {
    c_int::from(Priority::lowest().get())
}

/// One step more urgent than `prio`, clamped.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_prio_next_higher(prio: c_int) -> c_int {
    let (highest, lowest) = prio_bounds();
    (prio.clamp(highest, lowest) - 1).max(highest)
}

/// One step less urgent than `prio`, clamped.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_prio_next_lower(prio: c_int) -> c_int {
    let (highest, lowest) = prio_bounds();
    (prio.clamp(highest, lowest) + 1).min(lowest)
}

/// Numeric `(highest, lowest)`; a smaller number is more urgent.
fn prio_bounds() -> (c_int, c_int) {
    (
        c_int::from(Priority::highest().get()),
        c_int::from(Priority::lowest().get()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ULAPI_OK;

    #[test]
    fn test_prio_clamps() {
        // SAFETY: no pointers involved.
        unsafe {
            assert_eq!(ulapi_prio_highest(), 1);
            assert_eq!(ulapi_prio_lowest(), 31);
            assert_eq!(ulapi_prio_next_higher(1), 1);
            assert_eq!(ulapi_prio_next_lower(31), 31);
            assert_eq!(ulapi_prio_next_higher(10), 9);
            assert_eq!(ulapi_prio_next_lower(10), 11);
            assert_eq!(ulapi_prio_next_lower(100), 31);
        }
    }

    #[test]
    fn test_prio_out_of_range_never_zero() {
        // SAFETY: no pointers involved.
        unsafe {
            assert_eq!(ulapi_prio_next_higher(0), 1);
            assert_eq!(ulapi_prio_next_higher(-5), 1);
            assert_eq!(ulapi_prio_next_higher(c_int::MAX), 30);
            assert_eq!(ulapi_prio_next_lower(c_int::MIN), 2);
            assert_eq!(ulapi_prio_next_lower(0), 2);
        }
    }

    #[test]
    fn test_period_conversion() {
        assert_eq!(period_from_nsec(0).expect("zero"), None);
        assert_eq!(
            period_from_nsec(1_000).expect("1us"),
            Some(Duration::from_micros(1))
        );
        assert!(matches!(period_from_nsec(-5), Err(Error::BadArgs(_))));
    }

    #[test]
    fn test_null_handles() {
        // SAFETY: NULL is rejected before any dereference.
        unsafe {
            assert_eq!(ulapi_task_stop(std::ptr::null_mut()), ULAPI_BAD_ARGS);
            assert_eq!(ulapi_task_delete(std::ptr::null_mut()), ULAPI_BAD_ARGS);
            assert_eq!(ulapi_task_join(std::ptr::null_mut()), ULAPI_BAD_ARGS);
        }
    }

    #[test]
    fn test_unstarted_delete() {
        // SAFETY: handle comes from ulapi_task_new and is not reused.
        unsafe {
            let task = ulapi_task_new();
            assert!(!task.is_null());
            assert_eq!(ulapi_task_should_stop(), 0);
            assert_eq!(ulapi_task_delete(task), ULAPI_OK);
        }
    }
}
