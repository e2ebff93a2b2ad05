use crate::details::{
    resolve_with, CorrelationTable, EchoSocket, HostLookup, IcmpVersion, Identity, IdentityAllocator, OnReceive,
    Outcome, PingReceiver, PingSender, RunProgress, SendSchedule, Socket, StatisticsAggregator, SystemLookup,
    TSocket, TimeoutSweeper,
};
use crate::{AddressFamily, CancelToken, PingError, PingResult, PingerConfig, Sample, Statistics};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    /// [`Pinger::stop`] or a [`StopHandle`].
    Stopped,
    /// All requests were sent and each one was answered or timed out.
    CountReached,
    /// The token passed to [`Pinger::run`] was cancelled.
    Cancelled,
    DeadlineExceeded,
    /// A fatal error; `run` returned it.
    Failed,
}

/// Stops the run of the pinger it was taken from. Cheap to clone, idempotent, never blocks.
#[derive(Clone, Debug)]
pub struct StopHandle {
    token: CancelToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }
}

/// Pings one host.
///
/// The target address and the echo identifier are fixed at construction. A pinger runs at most
/// once; its statistics stay readable afterwards.
///
/// ```no_run
/// use ping_engine::{CancelToken, Pinger, PingerConfig};
/// use std::time::Duration;
///
/// let config = PingerConfig { count: 3, interval: Duration::from_millis(200), ..PingerConfig::default() };
/// let pinger = Pinger::with_config("localhost", config)?;
/// pinger.run(&CancelToken::new())?;
/// println!("{:?}", pinger.statistics());
/// # Ok::<(), ping_engine::PingError>(())
/// ```
pub struct Pinger {
    host: String,
    address: IpAddr,
    config: PingerConfig,
    identity: Identity,
    state: Mutex<RunState>,
    stop_reason: Mutex<Option<StopReason>>,
    stop_token: CancelToken,
    statistics: Arc<StatisticsAggregator>,
    on_receive: Option<OnReceive>,
}

impl Pinger {
    pub fn new(host: &str) -> PingResult<Self> {
        Self::with_config(host, PingerConfig::default())
    }

    /// `network` is one of "ip", "ip4" or "ip6".
    pub fn with_network(host: &str, network: &str) -> PingResult<Self> {
        let family = AddressFamily::from_network(network)?;
        Self::with_config(host, PingerConfig { family, ..PingerConfig::default() })
    }

    pub fn with_config(host: &str, config: PingerConfig) -> PingResult<Self> {
        Self::with_parts(host, config, &SystemLookup, IdentityAllocator::global())
    }

    /// Like [`Pinger::with_config`] with an explicit resolver and identifier pool.
    pub fn with_parts<L>(
        host: &str,
        config: PingerConfig,
        lookup: &L,
        identity_allocator: &IdentityAllocator,
    ) -> PingResult<Self>
    where
        L: HostLookup + ?Sized,
    {
        config.validate()?;
        let address = resolve_with(lookup, host, config.family)?;
        let identity = identity_allocator.allocate()?;
        tracing::debug!(host, %address, identity = identity.value(), "pinger created");

        Ok(Pinger {
            host: host.to_owned(),
            address,
            statistics: Arc::new(StatisticsAggregator::new(config.record_rtts)),
            config,
            identity,
            state: Mutex::new(RunState::Idle),
            stop_reason: Mutex::new(None),
            stop_token: CancelToken::new(),
            on_receive: None,
        })
    }

    /// Called from the receiver thread for every matched reply. May call [`StopHandle::stop`].
    pub fn set_on_receive<F>(&mut self, on_receive: F)
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        self.on_receive = Some(Arc::new(on_receive));
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn resolved_address(&self) -> IpAddr {
        self.address
    }

    #[must_use]
    pub fn identity(&self) -> u16 {
        self.identity.value()
    }

    #[must_use]
    pub fn config(&self) -> &PingerConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    /// `None` until a run has ended.
    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        *lock(&self.stop_reason)
    }

    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.statistics.snapshot()
    }

    /// Ends the current run, or the next one before it sends anything. Idempotent.
    pub fn stop(&self) {
        self.stop_token.cancel();
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { token: self.stop_token.clone() }
    }

    /// Pings until the count is reached, the pinger is stopped, `cancel` fires or the deadline
    /// passes. Only fatal errors are returned.
    pub fn run(&self, cancel: &CancelToken) -> PingResult<()> {
        self.begin()?;
        let version = IcmpVersion::of(&self.address);
        match Socket::new(self.config.socket_type, version, self.identity.value(), self.config.receive_poll_interval) {
            Ok(socket) => self.drive(socket, cancel),
            Err(e) => {
                self.end(StopReason::Failed);
                Err(PingError::Socket(e))
            }
        }
    }

    /// [`Pinger::run`] over a caller supplied network handle.
    pub fn run_with_socket<S>(&self, socket: S, cancel: &CancelToken) -> PingResult<()>
    where
        S: TSocket + 'static,
    {
        self.begin()?;
        self.drive(socket, cancel)
    }

    fn begin(&self) -> PingResult<()> {
        let mut state = lock(&self.state);
        if *state != RunState::Idle {
            return Err(PingError::AlreadyStarted);
        }
        *state = RunState::Running;
        Ok(())
    }

    fn end(&self, reason: StopReason) {
        *lock(&self.stop_reason) = Some(reason);
        *lock(&self.state) = RunState::Stopped;
    }

    fn drive<S>(&self, socket: S, cancel: &CancelToken) -> PingResult<()>
    where
        S: TSocket + 'static,
    {
        tracing::debug!(host = %self.host, address = %self.address, identity = self.identity.value(), "run start");

        // One token for the whole run; stop() and the caller's token both feed into it.
        let token = CancelToken::new();
        cancel.link(&token);
        self.stop_token.link(&token);

        let progress = Arc::new(RunProgress::new(token.clone()));
        let table = Arc::new(CorrelationTable::new());
        let echo_socket = Arc::new(EchoSocket::new(
            socket,
            IcmpVersion::of(&self.address),
            self.identity.value(),
            self.config.payload_size,
        ));

        let ping_sender = PingSender::new(echo_socket.clone(), table.clone(), self.statistics.clone(), self.address);
        let ping_receiver =
            PingReceiver::new(echo_socket, table.clone(), self.statistics.clone(), self.on_receive.clone());
        let sweeper = TimeoutSweeper::new(table, self.statistics.clone(), self.config.timeout);
        let schedule = SendSchedule {
            interval: self.config.interval,
            count: self.config.count,
            max_consecutive_failures: self.config.max_consecutive_send_failures,
        };

        // The receiver and the sweep are up before the first request leaves.
        let workers: [(&'static str, JoinHandle<()>); 3] = [
            ("receiver", {
                let progress = progress.clone();
                std::thread::spawn(move || ping_receiver.run(&progress))
            }),
            ("timeout sweep", {
                let progress = progress.clone();
                std::thread::spawn(move || sweeper.run(&progress))
            }),
            ("sender", {
                let progress = progress.clone();
                std::thread::spawn(move || ping_sender.run(&schedule, &progress))
            }),
        ];

        let deadline_exceeded = match self.config.deadline {
            Some(deadline) => !token.wait_timeout(deadline),
            None => !token.wait(),
        };
        *lock(&self.state) = RunState::Stopping;
        token.cancel();

        let mut panicked = None;
        for (name, handle) in workers {
            if handle.join().is_err() {
                tracing::error!(worker = name, "worker thread panicked");
                panicked.get_or_insert(name);
            }
        }

        let (reason, result) = match (panicked, progress.take_outcome()) {
            (Some(name), _) => (StopReason::Failed, Err(PingError::WorkerPanicked(name))),
            (None, Some(Outcome::Failed(e))) => (StopReason::Failed, Err(e)),
            (None, Some(Outcome::Finished(reason))) => (reason, Ok(())),
            (None, None) if deadline_exceeded => (StopReason::DeadlineExceeded, Ok(())),
            (None, None) if self.stop_token.is_cancelled() => (StopReason::Stopped, Ok(())),
            (None, None) => (StopReason::Cancelled, Ok(())),
        };
        self.end(reason);
        tracing::debug!(?reason, statistics = ?self.statistics.snapshot(), "run end");
        result
    }
}

impl std::fmt::Debug for Pinger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pinger")
            .field("host", &self.host)
            .field("address", &self.address)
            .field("identity", &self.identity.value())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
