use courier_graph::ActiveNodeSelection;
use courier_optimizer::OptimizationType;
use jiff::SpanRelativeTo;

pub fn parse_duration(input: &str) -> Result<jiff::SignedDuration, String> {
    if let Ok(duration) = input.parse::<jiff::SignedDuration>() {
        return Ok(duration);
    }

    if let Ok(duration) = input
        .parse::<jiff::Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        return Ok(duration);
    }

    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(jiff::SignedDuration::from_secs(seconds.abs()));
    }

    Err(String::from("Invalid duration"))
}

pub fn parse_selection(input: &str) -> Result<ActiveNodeSelection, String> {
    match input.to_ascii_lowercase().replace('-', "_").as_str() {
        "fifo" => Ok(ActiveNodeSelection::Fifo),
        "highest_label" | "highest" => Ok(ActiveNodeSelection::HighestLabel),
        _ => Err(format!("Unknown selection policy {input}, expected fifo or highest-label")),
    }
}

pub fn parse_optimization_type(input: &str) -> Result<OptimizationType, String> {
    serde_json::from_value(serde_json::Value::String(input.replace('-', "_")))
        .map_err(|_| format!("Unknown optimization type {input}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Ok(jiff::SignedDuration::from_secs(30)));
        assert_eq!(parse_duration("PT2M"), Ok(jiff::SignedDuration::from_mins(2)));
        assert_eq!(parse_duration("45"), Ok(jiff::SignedDuration::from_secs(45)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("FIFO"), Ok(ActiveNodeSelection::Fifo));
        assert_eq!(
            parse_selection("highest-label"),
            Ok(ActiveNodeSelection::HighestLabel)
        );
        assert!(parse_selection("lowest").is_err());
    }

    #[test]
    fn test_parse_optimization_type() {
        assert_eq!(
            parse_optimization_type("mincut-analysis"),
            Ok(OptimizationType::MincutAnalysis)
        );
        assert!(parse_optimization_type("fastest").is_err());
    }
}
