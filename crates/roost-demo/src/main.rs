//! Demo binary: a host and two clients over the in-process loopback
//! transport, with simulated loss and reordering on the unreliable class.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI
//! flags. Run with `cargo run -p roost-demo` and watch the log; pass
//! `--log-level debug` to see per-packet decisions, or `--lock-timeout-secs
//! 2` to watch stale locks get reclaimed faster.

use std::path::{Path, PathBuf};

use clap::Parser;
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roost_config::{CliArgs, Config};
use roost_net::{
    Delivery, EventKind, LoopbackHub, LoopbackTransport, Message, PeerId, Transport,
    TransportError, UpdateKind,
};
use roost_sync::{
    BroadcastConfig, ClientSession, EventConfig, HostSession, InterpConfig, LockConfig, Pose,
    SessionTuning, ZoneConfig,
};
use tracing::info;

const HOST: PeerId = PeerId(0);
const LOOT_CRATE: u64 = 4242;
const SUPPLY_CACHE: u64 = 4243;

/// Wraps a loopback endpoint and perturbs the unreliable class on receive:
/// a fraction of snapshots are dropped outright and another fraction is
/// held back one tick, arriving out of order behind newer ones.
struct LossyTransport {
    inner: LoopbackTransport,
    rng: StdRng,
    loss: f64,
    delay: f64,
    held: Vec<(PeerId, Message)>,
}

impl LossyTransport {
    fn new(inner: LoopbackTransport, seed: u64) -> Self {
        Self {
            inner,
            rng: StdRng::seed_from_u64(seed),
            loss: 0.10,
            delay: 0.15,
            held: Vec::new(),
        }
    }
}

impl Transport for LossyTransport {
    fn local_peer(&self) -> PeerId {
        self.inner.local_peer()
    }

    fn send_to_all(&self, msg: &Message, delivery: Delivery) -> Result<usize, TransportError> {
        self.inner.send_to_all(msg, delivery)
    }

    fn send_to(
        &self,
        peer: PeerId,
        msg: &Message,
        delivery: Delivery,
    ) -> Result<(), TransportError> {
        self.inner.send_to(peer, msg, delivery)
    }

    fn drain(&mut self) -> Vec<(PeerId, Message)> {
        let mut out: Vec<(PeerId, Message)> = self.held.drain(..).collect();
        for (peer, msg) in self.inner.drain() {
            if msg.delivery() == Delivery::Unreliable {
                let roll: f64 = self.rng.random();
                if roll < self.loss {
                    continue;
                }
                if roll < self.loss + self.delay {
                    self.held.push((peer, msg));
                    continue;
                }
            }
            out.push((peer, msg));
        }
        out
    }

    fn is_connected(&self, peer: PeerId) -> bool {
        self.inner.is_connected(peer)
    }

    fn peers(&self) -> Vec<PeerId> {
        self.inner.peers()
    }
}

fn tuning_from(config: &Config) -> SessionTuning {
    SessionTuning {
        interp: InterpConfig {
            back_time: config.interp.back_time_ms / 1000.0,
            snap_distance: config.interp.snap_distance,
            blend_factor: config.interp.blend_factor,
            max_extrapolation: config.interp.max_extrapolation_ms / 1000.0,
            ..InterpConfig::default()
        },
        broadcast: BroadcastConfig {
            interval: config.broadcast.interval_ms / 1000.0,
            position_threshold: config.broadcast.position_threshold,
            rotation_threshold_deg: config.broadcast.rotation_threshold_deg,
        },
        lock: LockConfig {
            timeout: config.lock.timeout_secs,
        },
        events: EventConfig {
            skew_warn: config.events.skew_warn_ms / 1000.0,
        },
        zones: ZoneConfig {
            cell_size: config.zones.cell_size,
        },
        ..SessionTuning::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from("config"));
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(&args);

    roost_log::init_logging(Some(Path::new("logs")), cfg!(debug_assertions), Some(&config));

    let tuning = tuning_from(&config);
    let hub = LoopbackHub::new();
    let mut host = HostSession::new(hub.register(HOST), tuning.clone());
    let mut clients: Vec<ClientSession<LossyTransport>> = (1..=2)
        .map(|i| {
            let transport = LossyTransport::new(hub.register(PeerId(i)), 0x5EED + i);
            ClientSession::new(transport, tuning.clone())
        })
        .collect();

    for client in clients.iter_mut() {
        client.callbacks.on_event_due = Some(Box::new(|due| {
            info!(
                entity = due.event.entity_id,
                kind = ?due.event.kind,
                skew_ms = due.skew * 1000.0,
                "event played"
            );
        }));
        client.callbacks.on_loot_lock_result = Some(Box::new(|resource, granted, holder| {
            info!(resource, granted, holder = ?holder, "loot lock result");
        }));
        client.callbacks.on_batch_update = Some(Box::new(|kind, object_id, state| {
            info!(?kind, object_id, state, "object state applied");
        }));
    }

    // World setup: the host's own avatar, one avatar per client, one
    // wandering NPC.
    let avatar = host.spawn_player(HOST, Pose::IDENTITY)?;
    for i in 1..=2 {
        host.spawn_player(
            PeerId(i),
            Pose::new(Vec3::new(i as f32 * 2.0, 0.0, 0.0), Quat::IDENTITY),
        )?;
    }
    let npc = host.spawn_npc(Pose::new(Vec3::new(10.0, 0.0, 10.0), Quat::IDENTITY))?;

    let dt = 1.0 / config.session.tick_rate as f64;
    let total_ticks = (8.0 / dt) as u64;
    info!(ticks = total_ticks, tick_rate = config.session.tick_rate, "running simulated session");

    for tick in 0..total_ticks {
        let t = tick as f64 * dt;

        // Scripted motion: the NPC orbits its spawn, the host avatar walks.
        {
            let registry = host.registry_mut();
            let angle = t as f32 * 0.8;
            if let Some(entry) = registry.get_mut(npc) {
                entry.pose.position =
                    Vec3::new(10.0 + 4.0 * angle.cos(), 0.0, 10.0 + 4.0 * angle.sin());
                entry.pose.rotation = Quat::from_rotation_y(angle);
                entry.velocity = Vec3::new(-3.2 * angle.sin(), 0.0, 3.2 * angle.cos());
            }
            if let Some(entry) = registry.get_mut(avatar) {
                entry.pose.position = Vec3::new(t as f32 * 1.5, 0.0, 0.0);
            }
        }

        // Scripted session beats.
        if tick == (0.5 / dt) as u64 {
            let decision = host.request_lock_local(SUPPLY_CACHE)?;
            info!(granted = decision.is_granted(), "host opened the supply cache");
        }
        if tick == (1.0 / dt) as u64 {
            clients[0].request_lock(LOOT_CRATE)?;
        }
        if tick == (1.2 / dt) as u64 {
            // Contested: the second client gets a structured denial.
            clients[1].request_lock(LOOT_CRATE)?;
        }
        if tick == (2.0 / dt) as u64 {
            host.broadcast_event(npc, EventKind::AttackStart, Vec3::new(10.0, 0.0, 10.0), 0.0, Vec::new())?;
            host.broadcast_event(npc, EventKind::Sound, Vec3::new(10.0, 0.0, 10.0), 0.25, Vec::new())?;
        }
        if tick == (2.5 / dt) as u64 {
            host.release_lock(SUPPLY_CACHE, HOST)?;
        }
        if tick == (3.0 / dt) as u64 {
            host.queue_object_update(UpdateKind::Door, 7, true);
            host.queue_object_update(UpdateKind::Lootbox, LOOT_CRATE, true);
        }
        if tick == (4.0 / dt) as u64 {
            host.release_lock(LOOT_CRATE, PeerId(1))?;
        }
        if tick == (5.0 / dt) as u64 {
            host.broadcast_event(npc, EventKind::Death, Vec3::new(12.0, 0.0, 8.0), 0.0, Vec::new())?;
            host.broadcast_event(npc, EventKind::ItemDrop, Vec3::new(12.0, 0.0, 8.0), 0.5, Vec::new())?;
        }
        if tick == (6.0 / dt) as u64 {
            // Predicted shot: local effect now, host verdict a beat later.
            let shot = clients[0].fire_shot(Vec3::new(2.0, 1.5, 0.0), Vec3::Z, 17);
            let verdict = clients[0].confirm_shot(shot, true, Some(Vec3::new(2.0, 1.5, 9.0)));
            info!(?verdict, "predicted shot resolved");
        }

        host.tick(dt)?;
        for client in clients.iter_mut() {
            client.tick(dt)?;
        }
    }

    let host_diag = host.diagnostics();
    info!(
        sent = host_diag.snapshots_sent,
        suppressed = host_diag.snapshots_suppressed,
        "host broadcast totals"
    );
    for (i, client) in clients.iter().enumerate() {
        let diag = client.diagnostics();
        info!(
            client = i + 1,
            accepted = diag.snapshots_accepted,
            stale_drops = diag.stale_drops,
            snaps = diag.snap_teleports,
            events = diag.events_played,
            late = diag.late_events,
            max_skew_ms = diag.max_skew * 1000.0,
            "client replica totals"
        );
        if config.debug.print_diagnostics {
            println!("client {}: {:#?}", i + 1, diag);
        }
    }

    Ok(())
}
