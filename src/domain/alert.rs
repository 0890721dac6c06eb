/// Whether this cycle's reading satisfies the operator's alert condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDecision {
    pub triggered: bool,
    pub condition: String,
}

impl AlertDecision {
    /// `ALERT: <condition>` when the condition held.
    pub fn alert_line(&self) -> Option<String> {
        self.triggered.then(|| format!("ALERT: {}", self.condition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_line_only_when_triggered() {
        let mut decision = AlertDecision {
            triggered: true,
            condition: "balance < 100".to_string(),
        };
        assert_eq!(decision.alert_line().as_deref(), Some("ALERT: balance < 100"));

        decision.triggered = false;
        assert_eq!(decision.alert_line(), None);
    }
}
