#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    LoadBatch { offset: u32, limit: u32 },
    DebounceSearch { value: String },
    CancelLookup,
    LookupCreature { query: String, generation: u64 },
    LoadSprite { id: u32, url: String },
}
