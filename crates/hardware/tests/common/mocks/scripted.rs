use gpumc_core::scheduler::{ChannelScheduler, DramStore, SchedulerState};
use gpumc_core::transaction::{ChannelTransaction, CtId};
use mockall::mock;

/// The parts of a scheduler a test wants to script.
pub trait ChunkSource {
    fn state(&self) -> SchedulerState;
    fn completed(&mut self, cycle: u64) -> Option<ChannelTransaction>;
}

mock! {
    pub ChunkSource {}
    impl ChunkSource for ChunkSource {
        fn state(&self) -> SchedulerState;
        fn completed(&mut self, cycle: u64) -> Option<ChannelTransaction>;
    }
}

/// Scheduler that swallows accepted chunks and reports whatever the mock returns.
pub struct ScriptedScheduler {
    pub source: MockChunkSource,
    accepted: Vec<CtId>,
    store: DramStore,
    cycle: u64,
}

impl ScriptedScheduler {
    pub fn new(source: MockChunkSource, row_size: u32) -> Self {
        Self {
            source,
            accepted: Vec::new(),
            store: DramStore::new(row_size),
            cycle: 0,
        }
    }
}

impl ChannelScheduler for ScriptedScheduler {
    fn clock(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    fn state(&self) -> SchedulerState {
        self.source.state()
    }

    fn accept(&mut self, ct: ChannelTransaction, _cycle: u64) {
        self.accepted.push(ct.id());
    }

    fn take_completed(&mut self) -> Option<ChannelTransaction> {
        self.source.completed(self.cycle)
    }

    fn preload(&mut self, bank: u32, row: u32, col: u32, data: &[u8], mask: Option<&[u32]>) {
        self.store.write(bank, row, col, data, mask);
    }

    fn read_data(&self, bank: u32, row: u32, col: u32, out: &mut [u8]) {
        self.store.read(bank, row, col, out);
    }

    fn write_data(&mut self, bank: u32, row: u32, col: u32, data: &[u8]) {
        self.store.write(bank, row, col, data, None);
    }

    fn pending(&self) -> usize {
        self.accepted.len()
    }
}
