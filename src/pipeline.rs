use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{RecursiveMode, Watcher};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use evdev::Device;
use touchview::{
    DeviceKind, GestureListener, Hooks, NotificationResult, Point, TouchController, ZoomDirection,
    config::ProfileStore,
    tracker::TickClock,
};

use crate::input::{self, MtDecoder, PointerEvent};

/// Logs recognised gestures; never suppresses default behavior.
struct LogListener;

impl GestureListener for LogListener {
    fn flung(&self, vx: f64, vy: f64) -> NotificationResult {
        info!("fling vx={vx:.0} vy={vy:.0}");
        NotificationResult::UNHANDLED
    }

    fn swiped(&self, vx: f64, vy: f64) -> NotificationResult {
        info!("swipe vx={vx:.0} vy={vy:.0}");
        NotificationResult::UNHANDLED
    }

    fn single_tapped(&self, p: Point) -> NotificationResult {
        info!("tap at ({:.0}, {:.0})", p.x, p.y);
        NotificationResult::UNHANDLED
    }

    fn double_tapped(&self, p: Point, taps: u32) -> NotificationResult {
        info!("{taps}x tap at ({:.0}, {:.0})", p.x, p.y);
        NotificationResult::UNHANDLED
    }

    fn long_tapped(&self, p: Point) -> NotificationResult {
        info!("long tap at ({:.0}, {:.0})", p.x, p.y);
        NotificationResult::UNHANDLED
    }

    fn zoom_requested(&self, direction: ZoomDirection, anchor: Point) -> NotificationResult {
        info!("{direction:?} requested at ({:.0}, {:.0})", anchor.x, anchor.y);
        NotificationResult::UNHANDLED
    }
}

fn install_signal_stop() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let flag = Arc::clone(&stop);
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("signal {sig}: stopping");
            flag.store(true, Ordering::SeqCst);
        }
    });
    Ok(stop)
}

// pointer ids from different devices must not collide
fn pointer_id(device: usize, tracking_id: i32) -> i64 {
    ((device as i64) << 32) | (tracking_id as u32 as i64)
}

pub fn run_watch(mut store: ProfileStore) -> Result<()> {
    let devices = input::discover_multitouch();
    if devices.is_empty() {
        return Err(anyhow!("no multitouch devices detected (check `touchview doctor`)"));
    }

    let mut devs: Vec<Device> = vec![];
    for d in devices {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                if let Err(e) = dev.set_nonblocking(true) {
                    warn!("{}: cannot set nonblocking: {e}", d.path);
                    continue;
                }
                info!("watching {} ({})", d.name, d.path);
                devs.push(dev);
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if devs.is_empty() {
        return Err(anyhow!("failed to open all detected devices"));
    }

    let stop = install_signal_stop()?;

    let (tx_reload, rx_reload) = mpsc::channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res
            && (ev.kind.is_modify() || ev.kind.is_create())
        {
            let _ = tx_reload.send(());
        }
    })?;
    watcher.watch(&store.profiles_dir, RecursiveMode::NonRecursive)?;

    let (vp, map) = store.profile.viewport.build();
    let hooks = Hooks {
        listener: Arc::new(LogListener),
        ..Hooks::default()
    };
    let mut ctl = TouchController::with_hooks(store.profile.gesture_config(), vp, map, hooks);
    let clock = TickClock::new();
    let mut decoders: Vec<MtDecoder> = devs.iter().map(|_| MtDecoder::new()).collect();

    info!("profile '{}' active; Ctrl-C to stop", store.active_name);

    while !stop.load(Ordering::SeqCst) {
        if rx_reload.try_recv().is_ok() {
            while rx_reload.try_recv().is_ok() {}
            match store.reload() {
                Ok(()) => {
                    ctl.set_config(store.profile.gesture_config());
                    info!("profile '{}' reloaded", store.active_name);
                }
                Err(e) => error!("reload failed, keeping last good profile: {e}"),
            }
        }

        let mut any_event = false;
        for (idx, (dev, dec)) in devs.iter_mut().zip(decoders.iter_mut()).enumerate() {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                let Some(frame) = dec.feed(ev.event_type(), ev.code(), ev.value()) else {
                    continue;
                };
                let now = clock.now();
                for pe in frame {
                    let r = match pe {
                        PointerEvent::Press { id, position } => {
                            ctl.on_press(pointer_id(idx, id), position, now, DeviceKind::Touch)
                        }
                        PointerEvent::Move { id, position } => {
                            ctl.on_move(pointer_id(idx, id), position, now, true)
                        }
                        PointerEvent::Release { id, position } => {
                            ctl.on_release(pointer_id(idx, id), position, now, DeviceKind::Touch)
                        }
                    };
                    r?;
                }
            }
        }

        ctl.apply_pending_zooms();

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    let vp = ctl.viewport();
    info!(
        "final viewport: centre=({:.1}, {:.1}) resolution={} rotation={:.1}",
        vp.center.x, vp.center.y, vp.resolution, vp.rotation
    );
    Ok(())
}
