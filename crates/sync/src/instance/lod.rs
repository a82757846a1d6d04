#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum DetailTier {
    #[default]
    High = 0,
    Medium = 1,
    Low = 2,
    Minimal = 3,
}

impl DetailTier {
    const ORDER: [Self; 3] = [Self::High, Self::Medium, Self::Low];
}

/// Color state of an instance row; invisible rows are written with zero alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Invisible,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Visible)
    }

    pub fn alpha(self) -> f32 {
        match self {
            Self::Visible => 1.0,
            Self::Invisible => 0.0,
        }
    }
}

/// Camera-distance thresholds. A slot uses the first tier whose distance
/// it is within, `Minimal` beyond the last, and is hidden past
/// `max_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct LodConfig {
    pub tier_distances: [f32; 3],
    pub max_distance: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            tier_distances: [50.0, 150.0, 400.0],
            max_distance: 1_000.0,
        }
    }
}

impl LodConfig {
    pub fn classify(&self, distance: f32) -> (DetailTier, Visibility) {
        if !distance.is_finite() {
            return (DetailTier::Minimal, Visibility::Invisible);
        }

        let tier = DetailTier::ORDER
            .iter()
            .zip(self.tier_distances)
            .find(|(_, limit)| distance <= *limit)
            .map_or(DetailTier::Minimal, |(tier, _)| *tier);

        let visibility = if distance <= self.max_distance {
            Visibility::Visible
        } else {
            Visibility::Invisible
        };

        (tier, visibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_by_distance() {
        let lod = LodConfig::default();

        assert_eq!(lod.classify(0.0), (DetailTier::High, Visibility::Visible));
        assert_eq!(lod.classify(50.0).0, DetailTier::High);
        assert_eq!(lod.classify(120.0).0, DetailTier::Medium);
        assert_eq!(lod.classify(399.0).0, DetailTier::Low);
        assert_eq!(lod.classify(800.0), (DetailTier::Minimal, Visibility::Visible));
        assert_eq!(lod.classify(1_000.5).1, Visibility::Invisible);
    }

    #[test]
    fn non_finite_distance_hidden() {
        let lod = LodConfig::default();
        assert_eq!(lod.classify(f32::NAN), (DetailTier::Minimal, Visibility::Invisible));
    }
}
