//! TrueSkill for two teams.
//!
//! Player skill is a Gaussian belief `N(mu, sigma²)`. After a match both
//! teams' beliefs move towards the observed result, with the update
//! weighted by how surprising that result was. With only two teams the
//! factor graph collapses to a single truncated Gaussian, so the update is
//! computed in closed form.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

pub const DEFAULT_MU: f64 = 25.0;
pub const DEFAULT_SIGMA: f64 = DEFAULT_MU / 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub mu: f64,
    pub sigma: f64,
}

impl Default for Rating {
    fn default() -> Self {
        Self::new(DEFAULT_MU, DEFAULT_SIGMA)
    }
}

impl Rating {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    /// Conservative skill estimate, `mu - 3 * sigma`. Starts at zero.
    pub fn exposure(&self) -> f64 {
        self.mu - 3.0 * self.sigma
    }
}

/// Result of a match from the first team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Won,
    Lost,
    Drawn,
}

impl MatchResult {
    pub fn from_scores(first: i64, second: i64) -> Self {
        match first.cmp(&second) {
            std::cmp::Ordering::Greater => MatchResult::Won,
            std::cmp::Ordering::Less => MatchResult::Lost,
            std::cmp::Ordering::Equal => MatchResult::Drawn,
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrueSkill {
    /// Rating of a new player.
    pub mu: f64,
    pub sigma: f64,
    /// Performance noise: the skill gap giving roughly 76% odds of winning.
    pub beta: f64,
    /// Uncertainty added before every update so ratings keep moving.
    pub tau: f64,
    pub draw_probability: f64,
}

impl Default for TrueSkill {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            sigma: DEFAULT_SIGMA,
            beta: DEFAULT_SIGMA / 2.0,
            tau: DEFAULT_SIGMA / 100.0,
            draw_probability: 0.10,
        }
    }
}

impl TrueSkill {
    pub fn rating(&self) -> Rating {
        Rating::new(self.mu, self.sigma)
    }

    /// Performance gap under which a match counts as drawn, for a match
    /// with `players` players in total.
    fn draw_margin(&self, players: usize) -> f64 {
        ppf((self.draw_probability + 1.0) / 2.0) * (players as f64).sqrt() * self.beta
    }

    /// New ratings for both teams after `first` played `second`.
    pub fn rate(
        &self,
        first: &[Rating],
        second: &[Rating],
        result: MatchResult,
    ) -> (Vec<Rating>, Vec<Rating>) {
        if result == MatchResult::Lost {
            let (second, first) = self.rate(second, first, MatchResult::Won);
            return (first, second);
        }

        let tau2 = self.tau * self.tau;
        let variance = |team: &[Rating]| -> Vec<f64> {
            team.iter().map(|r| r.sigma * r.sigma + tau2).collect()
        };
        let first_var = variance(first);
        let second_var = variance(second);

        let players = first.len() + second.len();
        let c2 = first_var.iter().chain(&second_var).sum::<f64>()
            + players as f64 * self.beta * self.beta;
        let c = c2.sqrt();

        let mean_gap = first.iter().map(|r| r.mu).sum::<f64>()
            - second.iter().map(|r| r.mu).sum::<f64>();
        let t = mean_gap / c;
        let epsilon = self.draw_margin(players) / c;

        let (v, w) = match result {
            MatchResult::Drawn => (v_draw(t, epsilon), w_draw(t, epsilon)),
            _ => (v_win(t, epsilon), w_win(t, epsilon)),
        };

        let update = |team: &[Rating], var: &[f64], sign: f64| -> Vec<Rating> {
            team.iter()
                .zip(var)
                .map(|(r, &var)| {
                    let mu = r.mu + sign * var / c * v;
                    let sigma = (var * (1.0 - var / c2 * w)).sqrt();
                    Rating::new(mu, sigma)
                })
                .collect()
        };
        (update(first, &first_var, 1.0), update(second, &second_var, -1.0))
    }

    /// Probability of a draw between the two teams relative to the most
    /// even match possible. Close to 1 means evenly matched.
    pub fn quality(&self, first: &[Rating], second: &[Rating]) -> f64 {
        let players = (first.len() + second.len()) as f64;
        let spread = players * self.beta * self.beta;
        let variance: f64 = first.iter().chain(second).map(|r| r.sigma * r.sigma).sum();
        let mean_gap = first.iter().map(|r| r.mu).sum::<f64>()
            - second.iter().map(|r| r.mu).sum::<f64>();

        let total = spread + variance;
        (spread / total).sqrt() * (-(mean_gap * mean_gap) / (2.0 * total)).exp()
    }
}

// ---------------------------------------------------------------------------
// Truncated Gaussian corrections
// ---------------------------------------------------------------------------

fn v_win(t: f64, epsilon: f64) -> f64 {
    let x = t - epsilon;
    let denom = cdf(x);
    if denom > 0.0 {
        pdf(x) / denom
    } else {
        -x
    }
}

fn w_win(t: f64, epsilon: f64) -> f64 {
    let v = v_win(t, epsilon);
    (v * (v + t - epsilon)).clamp(0.0, 1.0)
}

fn v_draw(t: f64, epsilon: f64) -> f64 {
    let a = epsilon - t.abs();
    let b = -epsilon - t.abs();
    let denom = cdf(a) - cdf(b);
    let v = if denom > 0.0 { (pdf(b) - pdf(a)) / denom } else { a };
    if t < 0.0 {
        -v
    } else {
        v
    }
}

fn w_draw(t: f64, epsilon: f64) -> f64 {
    let a = epsilon - t.abs();
    let b = -epsilon - t.abs();
    let denom = cdf(a) - cdf(b);
    if denom <= 0.0 {
        return 1.0;
    }
    let v = v_draw(t.abs(), epsilon);
    (v * v + (a * pdf(a) - b * pdf(b)) / denom).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Standard normal distribution
// ---------------------------------------------------------------------------

const SQRT_2: f64 = std::f64::consts::SQRT_2;

fn pdf(x: f64) -> f64 {
    (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Inverse of [`cdf`].
fn ppf(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Complementary error function, Chebyshev fit with relative error
/// below 1.2e-7.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + z / 2.0);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x < 0.0 {
        2.0 - r
    } else {
        r
    }
}

/// Inverse of [`erfc`], refined with two Newton steps.
fn erfc_inv(y: f64) -> f64 {
    if y >= 2.0 {
        return -100.0;
    }
    if y <= 0.0 {
        return 100.0;
    }
    let lower = y < 1.0;
    let y = if lower { y } else { 2.0 - y };

    let t = (-2.0 * (y / 2.0).ln()).sqrt();
    let mut x = -std::f64::consts::FRAC_1_SQRT_2
        * ((2.307_53 + t * 0.270_61) / (1.0 + t * (0.992_29 + t * 0.044_81)) - t);
    for _ in 0..2 {
        let err = erfc(x) - y;
        x += err / (std::f64::consts::FRAC_2_SQRT_PI * (-x * x).exp() - x * err);
    }
    if lower {
        x
    } else {
        -x
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_normal_distribution() {
        assert!(close(cdf(0.0), 0.5));
        assert!(close(cdf(1.96), 0.975));
        assert!(close(pdf(0.0), 0.398_942));
        assert!(close(ppf(0.975), 1.96));
        assert!(close(ppf(cdf(-0.7)), -0.7));
    }

    #[test]
    fn test_new_rating_has_zero_exposure() {
        let r = Rating::default();
        assert_eq!(r.mu, 25.0);
        assert!(r.exposure().abs() < 1e-9);
        assert_eq!(TrueSkill::default().rating(), r);
    }

    #[test]
    fn test_one_on_one_win() {
        let env = TrueSkill::default();
        let (w, l) = env.rate(&[env.rating()], &[env.rating()], MatchResult::Won);
        assert!(close(w[0].mu, 29.396));
        assert!(close(w[0].sigma, 7.171));
        assert!(close(l[0].mu, 20.604));
        assert!(close(l[0].sigma, 7.171));
    }

    #[test]
    fn test_loss_mirrors_win() {
        let env = TrueSkill::default();
        let (l, w) = env.rate(&[env.rating()], &[env.rating()], MatchResult::Lost);
        assert!(close(l[0].mu, 20.604));
        assert!(close(w[0].mu, 29.396));
    }

    #[test]
    fn test_one_on_one_draw() {
        let env = TrueSkill::default();
        let (a, b) = env.rate(&[env.rating()], &[env.rating()], MatchResult::Drawn);
        assert!(close(a[0].mu, 25.0));
        assert!(close(a[0].sigma, 6.458));
        assert_eq!(a, b);
    }

    #[test]
    fn test_draw_pulls_ratings_together() {
        let env = TrueSkill::default();
        let strong = Rating::new(30.0, 4.0);
        let weak = Rating::new(20.0, 4.0);
        let (a, b) = env.rate(&[strong], &[weak], MatchResult::Drawn);
        assert!(close(a[0].mu, 27.608));
        assert!(close(b[0].mu, 22.392));
        assert!(close(a[0].sigma, 3.490));
    }

    #[test]
    fn test_two_on_two() {
        let env = TrueSkill::default();
        let team = [env.rating(), env.rating()];
        let (w, l) = env.rate(&team, &team, MatchResult::Won);
        assert_eq!(w.len(), 2);
        assert!(close(w[1].mu, 28.108));
        assert!(close(w[1].sigma, 7.774));
        assert!(close(l[0].mu, 21.892));
    }

    #[test]
    fn test_quality() {
        let env = TrueSkill::default();
        assert!(close(env.quality(&[env.rating()], &[env.rating()]), 0.447));

        let even = env.quality(&[Rating::new(25.0, 3.0)], &[Rating::new(25.0, 3.0)]);
        let uneven = env.quality(&[Rating::new(35.0, 3.0)], &[Rating::new(20.0, 3.0)]);
        assert!(even > uneven);
        assert!(even <= 1.0);
    }

    #[test]
    fn test_result_from_scores() {
        assert_eq!(MatchResult::from_scores(15, 7), MatchResult::Won);
        assert_eq!(MatchResult::from_scores(7, 15), MatchResult::Lost);
        assert_eq!(MatchResult::from_scores(5, 5), MatchResult::Drawn);
    }
}
