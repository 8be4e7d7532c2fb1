//! Cyclic color assignment for blocks and static routes.

use crate::model::property::Color;

/// Hands out palette colors in order, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ColorCycler {
    palette: Vec<Color>,
    next: usize,
}

impl ColorCycler {
    pub fn new(palette: Vec<Color>) -> Self {
        Self { palette, next: 0 }
    }

    /// `None` only for an empty palette.
    pub fn next_color(&mut self) -> Option<Color> {
        if self.palette.is_empty() {
            return None;
        }
        let color = self.palette[self.next % self.palette.len()];
        self.next = (self.next + 1) % self.palette.len();
        Some(color)
    }
}

#[cfg(test)]
mod tests {
    use super::ColorCycler;
    use crate::model::property::Color;

    #[test]
    fn wraps_around_palette() {
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);
        let mut cycler = ColorCycler::new(vec![red, blue]);
        let colors: Vec<_> = (0..3).filter_map(|_| cycler.next_color()).collect();
        assert_eq!(colors, [red, blue, red]);
    }

    #[test]
    fn empty_palette_yields_nothing() {
        assert!(ColorCycler::new(Vec::new()).next_color().is_none());
    }
}
