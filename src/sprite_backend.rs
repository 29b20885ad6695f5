use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock};

use crossterm::{cursor::MoveTo, queue, style::Print};
use ratatui::backend::{Backend, ClearType, CrosstermBackend, WindowSize};
use ratatui::buffer::Cell;
use ratatui::layout::{Position, Size};

/// Kitty image placements collected while rendering one frame.
#[derive(Default, Debug, Clone)]
pub struct SpriteRegistry {
    placements: BTreeMap<(u16, u16), String>,
}

impl SpriteRegistry {
    pub fn place(&mut self, x: u16, y: u16, sequence: String) {
        self.placements.insert((x, y), sequence);
    }

    pub fn clear(&mut self) {
        self.placements.clear();
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn entries(&self) -> Vec<((u16, u16), String)> {
        self.placements
            .iter()
            .map(|(pos, sequence)| (*pos, sequence.clone()))
            .collect()
    }
}

static REGISTRY: OnceLock<Arc<Mutex<SpriteRegistry>>> = OnceLock::new();

pub fn sprite_registry() -> Arc<Mutex<SpriteRegistry>> {
    REGISTRY
        .get_or_init(|| Arc::new(Mutex::new(SpriteRegistry::default())))
        .clone()
}

fn with_registry<R>(f: impl FnOnce(&mut SpriteRegistry) -> R) -> R {
    let registry = sprite_registry();
    let mut guard = match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}

pub fn place_sprite(x: u16, y: u16, sequence: String) {
    with_registry(|registry| registry.place(x, y, sequence));
}

pub fn clear_sprites() {
    with_registry(SpriteRegistry::clear);
}

/// Crossterm backend that emits the registered kitty placements after each
/// draw and deletes the previous frame's images first.
#[derive(Debug, Clone)]
pub struct SpriteBackend<W: Write> {
    inner: CrosstermBackend<W>,
    registry: Arc<Mutex<SpriteRegistry>>,
    had_sprites: bool,
}

impl<W: Write> SpriteBackend<W> {
    pub fn new(writer: W, registry: Arc<Mutex<SpriteRegistry>>) -> Self {
        Self {
            inner: CrosstermBackend::new(writer),
            registry,
            had_sprites: false,
        }
    }

    fn pending_placements(&self) -> Vec<((u16, u16), String)> {
        match self.registry.lock() {
            Ok(registry) => registry.entries(),
            Err(poisoned) => poisoned.into_inner().entries(),
        }
    }
}

impl<W: Write> Backend for SpriteBackend<W> {
    fn draw<'a, I>(&mut self, content: I) -> io::Result<()>
    where
        I: Iterator<Item = (u16, u16, &'a Cell)>,
    {
        self.inner.draw(content)?;
        let placements = self.pending_placements();
        if self.had_sprites {
            queue!(self.inner, Print("\x1b_Ga=d,d=a,q=2\x1b\\"))?;
        }
        if placements.is_empty() {
            self.had_sprites = false;
            return Ok(());
        }
        for ((x, y), sequence) in placements {
            queue!(self.inner, MoveTo(x, y), Print(sequence))?;
        }
        self.had_sprites = true;
        Ok(())
    }

    fn append_lines(&mut self, n: u16) -> io::Result<()> {
        self.inner.append_lines(n)
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        self.inner.hide_cursor()
    }

    fn show_cursor(&mut self) -> io::Result<()> {
        self.inner.show_cursor()
    }

    fn get_cursor_position(&mut self) -> io::Result<Position> {
        self.inner.get_cursor_position()
    }

    fn set_cursor_position<P: Into<Position>>(&mut self, position: P) -> io::Result<()> {
        self.inner.set_cursor_position(position)
    }

    fn clear(&mut self) -> io::Result<()> {
        self.inner.clear()
    }

    fn clear_region(&mut self, clear_type: ClearType) -> io::Result<()> {
        self.inner.clear_region(clear_type)
    }

    fn size(&self) -> io::Result<Size> {
        self.inner.size()
    }

    fn window_size(&mut self) -> io::Result<WindowSize> {
        self.inner.window_size()
    }

    fn flush(&mut self) -> io::Result<()> {
        Backend::flush(&mut self.inner)
    }
}

impl<W: Write> Write for SpriteBackend<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_keeps_one_placement_per_cell() {
        let mut registry = SpriteRegistry::default();
        registry.place(2, 3, "a".to_string());
        registry.place(2, 3, "b".to_string());
        registry.place(40, 3, "c".to_string());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[0], ((2, 3), "b".to_string()));
        registry.clear();
        assert!(registry.is_empty());
    }
}
