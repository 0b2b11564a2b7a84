use common::Tier;

use crate::config::Config;

pub fn list(cfg: &Config, tier: Option<Tier>) -> anyhow::Result<()> {
    print!("{}", render(cfg, tier));
    Ok(())
}

fn render(cfg: &Config, tier: Option<Tier>) -> String {
    let mut out = format!("{:<12} {:<4} {:<44} {}\n", "PROVIDER", "TIER", "MODEL", "LABEL");
    for m in cfg.models.iter().filter(|m| tier.map_or(true, |t| m.tier == t)) {
        out.push_str(&format!("{:<12} {:<4} {:<44} {}\n", m.provider, m.tier.label(), m.id, m.label));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_model_with_header() {
        let cfg = Config::default();
        let text = render(&cfg, None);
        assert_eq!(text.lines().count(), cfg.models.len() + 1);
        assert!(text.starts_with("PROVIDER"));
    }

    #[test]
    fn tier_filter_applies() {
        let cfg = Config::default();
        let tier = cfg.models[0].tier;
        let expected = cfg.models.iter().filter(|m| m.tier == tier).count();
        assert_eq!(render(&cfg, Some(tier)).lines().count(), expected + 1);
    }
}
