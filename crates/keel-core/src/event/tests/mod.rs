
#[cfg(test)]
mod tests {
    use crate::event::{ListenerOutcome, SubscriptionId};

    #[test]
    fn test_listener_outcome_default() {
        assert_eq!(ListenerOutcome::default(), ListenerOutcome::Continue);
    }

    #[test]
    fn test_subscription_id_prefixes() {
        assert_eq!(SubscriptionId::durable(7).as_str(), "sub_7");
        assert_eq!(SubscriptionId::one_shot(8).to_string(), "once_8");
    }
}
