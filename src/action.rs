use serde::{Deserialize, Serialize};

use crate::sprite::SpriteData;
use crate::state::{CreatureRecord, LookupOutcome, MoveDir};

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[action(infer_categories)]
pub enum Action {
    Init,

    BatchRequest,
    BatchDidLoad {
        offset: u32,
        records: Vec<CreatureRecord>,
        has_more: bool,
    },
    BatchDidError { offset: u32, error: String },

    SearchStart,
    SearchInput(char),
    SearchBackspace,
    SearchClear,
    SearchClose,
    SearchApply(String),

    LookupDidLoad { generation: u64, outcome: LookupOutcome },
    LookupDidError { generation: u64, error: String },

    GridMove(MoveDir),
    GridScroll(i16),
    OverlayOpen,
    OverlayClose,

    SpriteDidLoad { id: u32, sprite: SpriteData },
    SpriteDidError { id: u32, error: String },

    UiTerminalResize(u16, u16),
    Tick,
    Quit,
}
