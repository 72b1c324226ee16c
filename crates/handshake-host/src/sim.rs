use core::cell::RefCell;

use anyhow::{anyhow, bail, Result};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use i2c_handshake::loopback::{LoopbackBus, LoopbackPort, MAX_MESSAGE};
use i2c_handshake::{
    CompletionRouter, DeferredActions, HandshakeConfig, MasterSequencer,
    SharedResponder, SlaveResponder, Tick,
};
use tracing::{debug, info};

type Responder<'a> =
    SharedResponder<NoopRawMutex, LoopbackPort<'a>, MAX_MESSAGE, MAX_MESSAGE>;

/// What a finished simulation observed.
#[derive(Debug)]
pub struct Report {
    pub cycles: u32,
    pub ticks: Tick,
    pub request: Vec<u8>,
    pub response: Vec<u8>,
}

pub struct Simulation<'p> {
    pub config: HandshakeConfig,
    pub request: &'p [u8],
    pub response: &'p [u8],
    pub target: Option<u8>,
    pub cycles: u32,
    pub max_ticks: Tick,
}

impl Simulation<'_> {
    /// Drive both ends of the bus until `cycles` round trips completed.
    ///
    /// Each simulated tick first delivers every pending bus interrupt and
    /// then runs one pass of the cooperative loop.
    pub fn run(&self) -> Result<Report> {
        let bus = LoopbackBus::new(self.config.slave_address);
        if let Some(target) = self.target {
            bus.set_master_target(target);
        }
        let actions = DeferredActions::new();

        let mut slave =
            SlaveResponder::new(bus.slave(), &self.config, self.response)
                .map_err(|e| anyhow!("invalid slave configuration: {e}"))?;
        slave.arm().map_err(|e| anyhow!("failed to arm slave: {e}"))?;
        let responder: Responder<'_> = Mutex::new(RefCell::new(slave));
        let router = CompletionRouter::new(&actions, &responder);

        let mut master = MasterSequencer::<_, MAX_MESSAGE, MAX_MESSAGE>::new(
            bus.master(),
            &actions,
            &self.config,
            self.request,
        )
        .map_err(|e| anyhow!("invalid master configuration: {e}"))?;

        let mut now: Tick = 0;
        while master.cycles() < self.cycles {
            if now >= self.max_ticks {
                bail!(
                    "gave up after {now} ticks in phase {:?} with {} cycles done",
                    master.phase(),
                    master.cycles()
                );
            }

            while let Some(event) = bus.next_event() {
                debug!(?event, now, "bus interrupt");
                router.dispatch(event);
            }

            let before = master.cycles();
            master.step(now).map_err(|e| {
                let slave = responder.lock(|cell| cell.borrow().fault());
                anyhow!(
                    "halted at tick {now} in phase {:?}: {e} (slave fault: {slave:?})",
                    master.phase()
                )
            })?;
            if master.cycles() != before {
                info!(
                    cycle = master.cycles(),
                    now,
                    response = %String::from_utf8_lossy(master.response()),
                    "master received"
                );
            }
            now = now.wrapping_add(1);
        }

        Ok(Report {
            cycles: master.cycles(),
            ticks: now,
            request: responder.lock(|cell| cell.borrow().request().to_vec()),
            response: master.response().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &[u8] = b"Hello from CM7 Master!";
    const RESPONSE: &[u8] =
        b"Hello from CM7 Master! Positive response from slave!";

    fn simulation(cycles: u32) -> Simulation<'static> {
        Simulation {
            config: HandshakeConfig::DEFAULT,
            request: REQUEST,
            response: RESPONSE,
            target: None,
            cycles,
            max_ticks: 10_000,
        }
    }

    #[test]
    fn runs_requested_cycles() {
        let report = simulation(3).run().unwrap();
        assert_eq!(report.cycles, 3);
        assert_eq!(report.request, REQUEST);
        assert_eq!(report.response, RESPONSE);
        // Third cycle completes 4 ticks after its send at 2 * 105.
        assert_eq!(report.ticks, 215);
    }

    #[test]
    fn wrong_target_halts() {
        let sim = Simulation { target: Some(0x42), ..simulation(1) };
        let err = sim.run().unwrap_err().to_string();
        assert!(err.contains("AwaitMasterSendDone"), "{err}");
    }

    #[test]
    fn oversized_payload_is_rejected_up_front() {
        let long = [b'x'; MAX_MESSAGE + 1];
        let sim = Simulation {
            config: HandshakeConfig::symmetric(long.len(), RESPONSE.len()),
            request: &long,
            ..simulation(1)
        };
        let err = sim.run().unwrap_err().to_string();
        assert!(err.contains("invalid"), "{err}");
    }
}
