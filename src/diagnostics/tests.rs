use std::sync::Arc;

use super::*;

fn timing_labels(sink: &RecordingSink) -> Vec<(String, usize)> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            FitEvent::Timing { label, depth, .. } => Some((label, depth)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_nested_scopes_report_inner_first() {
    let sink = Arc::new(RecordingSink::new());
    let printer = Printer::new(sink.clone(), 100);
    {
        let _outer = printer.timed("fit");
        assert_eq!(printer.depth(), 1);
        {
            let _inner = printer.timed("assembly");
            assert_eq!(printer.depth(), 2);
        }
        assert_eq!(printer.depth(), 1);
    }
    assert_eq!(printer.depth(), 0);
    assert_eq!(
        timing_labels(&sink),
        vec![("assembly".to_string(), 2), ("fit".to_string(), 1)]
    );
}

#[test]
fn test_max_print_depth() {
    let sink = Arc::new(RecordingSink::new());
    let printer = Printer::new(sink.clone(), 1);
    {
        let _outer = printer.timed("fit");
        printer.message("hidden");
        let _inner = printer.timed("assembly");
    }
    printer.message("shown");
    printer.iteration(0, 0, 1., 2.);
    let events = sink.events();
    assert_eq!(timing_labels(&sink), vec![("fit".to_string(), 1)]);
    assert!(events.contains(&FitEvent::Message {
        message: "shown".to_string()
    }));
    assert!(!events.contains(&FitEvent::Message {
        message: "hidden".to_string()
    }));
    assert_eq!(sink.iterations(), vec![(0, 0, 1., 2.)]);
}

#[test]
fn test_silent_printer_still_reports_iterations() {
    let sink = Arc::new(RecordingSink::new());
    let printer = Printer::new(sink.clone(), 0);
    {
        let _scope = printer.timed("fit");
        printer.iteration(3, 1, 0.5, 0.25);
    }
    assert_eq!(sink.events().len(), 1);
    sink.clear();
    assert!(sink.events().is_empty());
}

#[test]
fn test_log_sink_accepts_all_events() {
    let printer = Printer::new(Arc::new(LogSink), 10);
    let _scope = printer.timed("fit");
    printer.message("message");
    printer.iteration(1, 0, 1e-3, 4.);
}
