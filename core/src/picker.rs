//! Color and brightness selection for a single light update.

use rand::Rng;

use crate::color::ColorValue;
use crate::scene::{ColorGroup, Span};

/// Result of one pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pick {
    /// Index of the chosen group
    pub group: usize,
    pub color: ColorValue,
    /// `None` leaves the device at its current level
    pub brightness: Option<u8>,
    /// Next sequence position, only in sequence mode
    pub next_cursor: Option<usize>,
}

/// Chooses colors from a scene's color groups.
///
/// Borrowed per tick; holds no state of its own besides the cached total weight.
#[derive(Debug, Clone, Copy)]
pub struct ColorPicker<'a> {
    groups: &'a [ColorGroup],
    scene_brightness: Option<Span<u8>>,
    total_weight: u64,
}

impl<'a> ColorPicker<'a> {
    pub fn new(groups: &'a [ColorGroup], scene_brightness: Option<Span<u8>>) -> Self {
        let total_weight = groups.iter().map(|g| u64::from(g.weight)).sum();
        Self {
            groups,
            scene_brightness,
            total_weight,
        }
    }

    pub fn group(&self, index: usize) -> Option<&'a ColorGroup> {
        self.groups.get(index)
    }

    /// Weighted draw: uniform in `[0, total)`, first group whose cumulative
    /// weight exceeds the draw wins.
    pub fn weighted_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.total_weight == 0 {
            return None;
        }
        let draw = rng.gen_range(0..self.total_weight);
        let mut cumulative = 0u64;
        for (idx, group) in self.groups.iter().enumerate() {
            cumulative += u64::from(group.weight);
            if cumulative > draw {
                return Some(idx);
            }
        }
        None
    }

    /// Sequence position `cursor` (wrapping) and the position after it.
    pub fn sequence(&self, cursor: usize) -> Option<(usize, usize)> {
        if self.groups.is_empty() {
            return None;
        }
        let index = cursor % self.groups.len();
        Some((index, (index + 1) % self.groups.len()))
    }

    /// Base color of `group`, perturbed per channel when nearby colors are on.
    pub fn pick_color<R: Rng + ?Sized>(&self, group: &ColorGroup, rng: &mut R) -> ColorValue {
        if group.nearby == 0 {
            return group.value;
        }
        let delta = nearby_delta(group.nearby);
        group.value.with_channels(|channel| {
            let offset = rng.gen_range(-delta..=delta);
            (i16::from(channel) + offset).clamp(0, 255) as u8
        })
    }

    /// Scene-level fixed brightness wins, then the group's span, then the
    /// scene's span.
    pub fn pick_brightness<R: Rng + ?Sized>(&self, group: &ColorGroup, rng: &mut R) -> Option<u8> {
        match (self.scene_brightness, group.brightness) {
            (Some(Span::Fixed(level)), _) => Some(level),
            (_, Some(span)) => Some(span.sample(rng)),
            (Some(span), None) => Some(span.sample(rng)),
            (None, None) => None,
        }
    }

    /// Choose a group (sequence mode when `cursor` is given) and draw its
    /// color and brightness.
    pub fn pick<R: Rng + ?Sized>(&self, cursor: Option<usize>, rng: &mut R) -> Option<Pick> {
        let (index, next_cursor) = match cursor {
            Some(cursor) => {
                let (index, next) = self.sequence(cursor)?;
                (index, Some(next))
            }
            None => (self.weighted_index(rng)?, None),
        };
        let group = self.groups.get(index)?;
        Some(Pick {
            group: index,
            color: self.pick_color(group, rng),
            brightness: self.pick_brightness(group, rng),
            next_cursor,
        })
    }
}

/// Per-channel offset bound for a nearby radius in percent.
fn nearby_delta(radius: u8) -> i16 {
    (f64::from(radius) / 100.0 * 255.0).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn group(value: ColorValue, weight: u32) -> ColorGroup {
        ColorGroup {
            value,
            brightness: None,
            weight,
            nearby: 0,
            one_change_per_tick: false,
        }
    }

    #[test]
    fn weighted_frequencies_follow_weights() {
        let groups = vec![
            group(ColorValue::Rgb([255, 0, 0]), 1),
            group(ColorValue::Rgb([0, 255, 0]), 3),
            group(ColorValue::Rgb([0, 0, 255]), 6),
        ];
        let picker = ColorPicker::new(&groups, None);
        let mut rng = StdRng::seed_from_u64(42);

        let draws = 20_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            counts[picker.weighted_index(&mut rng).unwrap()] += 1;
        }

        for (count, expected) in counts.iter().zip([0.1, 0.3, 0.6]) {
            let observed = *count as f64 / draws as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn sequence_visits_each_group_in_order() {
        let groups = vec![
            group(ColorValue::Rgb([1, 0, 0]), 1),
            group(ColorValue::Rgb([2, 0, 0]), 100),
            group(ColorValue::Rgb([3, 0, 0]), 1),
        ];
        let picker = ColorPicker::new(&groups, None);
        let mut rng = StdRng::seed_from_u64(1);

        let mut cursor = 0;
        let mut seen = Vec::new();
        for _ in 0..6 {
            let pick = picker.pick(Some(cursor), &mut rng).unwrap();
            seen.push(pick.group);
            cursor = pick.next_cursor.unwrap();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);

        // Stale cursors past the end wrap instead of panicking
        assert_eq!(picker.sequence(7), Some((1, 2)));
    }

    #[test]
    fn nearby_stays_within_delta_and_clamps() {
        let mut base = group(ColorValue::Rgb([250, 128, 3]), 1);
        base.nearby = 10;
        let picker = ColorPicker::new(std::slice::from_ref(&base), None);
        let delta = nearby_delta(10);
        assert_eq!(delta, 26);

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..500 {
            let ColorValue::Rgb(channels) = picker.pick_color(&base, &mut rng) else {
                panic!("color type changed");
            };
            for (got, want) in channels.iter().zip([250u8, 128, 3]) {
                assert!((i16::from(*got) - i16::from(want)).abs() <= delta);
            }
        }
    }

    #[test]
    fn nearby_ignored_for_non_rgb() {
        let mut temp = group(ColorValue::ColorTemp(2700), 1);
        temp.nearby = 50;
        let picker = ColorPicker::new(std::slice::from_ref(&temp), None);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(picker.pick_color(&temp, &mut rng), ColorValue::ColorTemp(2700));
    }

    #[test]
    fn brightness_precedence() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut with_span = group(ColorValue::Rgb([0, 0, 0]), 1);
        with_span.brightness = Some(Span::Range(10, 20));
        let plain = group(ColorValue::Rgb([0, 0, 0]), 1);

        let fixed_scene = ColorPicker::new(&[], Some(Span::Fixed(200)));
        assert_eq!(fixed_scene.pick_brightness(&with_span, &mut rng), Some(200));

        let ranged_scene = ColorPicker::new(&[], Some(Span::Range(100, 110)));
        let b = ranged_scene.pick_brightness(&with_span, &mut rng).unwrap();
        assert!((10..=20).contains(&b));
        let b = ranged_scene.pick_brightness(&plain, &mut rng).unwrap();
        assert!((100..=110).contains(&b));

        let no_scene = ColorPicker::new(&[], None);
        assert_eq!(no_scene.pick_brightness(&plain, &mut rng), None);
    }
}
