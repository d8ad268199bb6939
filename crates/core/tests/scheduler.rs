use meshflow_core::{
    bind_param, make_swept_volume, rectangle_profile, Configurable, Generator, GraphError,
    GeneratorError, Module, ModuleError, ModuleInfo, NodeId, NodeParams, ParamError,
    ParamRegistry, ParamValue, PinDefinition, PinKind, PinType, Previewable, RefreshContext,
    Refreshable, Severity, SlotData,
};

#[derive(Default)]
struct ProbeSettings {
    source: bool,
    fail: bool,
    scale: f32,
}

/// Volume pass-through that can also act as a source or fail on demand.
struct Probe {
    settings: ProbeSettings,
    registry: ParamRegistry<ProbeSettings>,
}

impl Probe {
    fn boxed(source: bool) -> Box<dyn Module> {
        let registry = ParamRegistry::<ProbeSettings>::new();
        let registry = bind_param!(registry, "source", source);
        let registry = bind_param!(registry, "fail", fail);
        let registry = bind_param!(registry, "scale", scale);
        Box::new(Probe {
            settings: ProbeSettings {
                source,
                ..ProbeSettings::default()
            },
            registry,
        })
    }
}

impl Configurable for Probe {
    fn param(&self, name: &str) -> Option<ParamValue> {
        self.registry.get(&self.settings, name)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ParamError> {
        self.registry.set(&mut self.settings, name, value)
    }

    fn param_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    fn params(&self) -> NodeParams {
        self.registry.snapshot(&self.settings)
    }
}

impl Refreshable for Probe {
    fn refresh(&mut self, ctx: &mut RefreshContext<'_>) -> Result<(), ModuleError> {
        if self.settings.fail {
            return Err(ModuleError::Failed("probe failure".to_string()));
        }
        let output = if self.settings.source {
            SlotData::from(make_swept_volume(&rectangle_profile([1.0, 1.0]), 1.0, 2, false))
        } else {
            ctx.get_data(0)
        };
        ctx.set_output(0, output);
        Ok(())
    }
}

impl Previewable for Probe {
    fn preview(&self) -> String {
        "probe".to_string()
    }
}

impl Module for Probe {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            kind: "Probe",
            category: "Test",
            inputs: vec![PinDefinition::new("in", PinType::Volume).optional()],
            outputs: vec![PinDefinition::new("out", PinType::Volume)],
        }
    }
}

fn link(generator: &mut Generator, from: NodeId, to: NodeId) {
    generator
        .connect_by_name(from, "out", to, "in")
        .expect("link");
}

/// a -> b -> c, plus an unrelated source d.
fn chain() -> (Generator, [NodeId; 4]) {
    let mut generator = Generator::default();
    let a = generator.add_module(Probe::boxed(true));
    let b = generator.add_module(Probe::boxed(false));
    let c = generator.add_module(Probe::boxed(false));
    let d = generator.add_module(Probe::boxed(true));
    link(&mut generator, a, b);
    link(&mut generator, b, c);
    (generator, [a, b, c, d])
}

#[test]
fn second_refresh_does_no_work() {
    let (mut generator, nodes) = chain();
    let report = generator.request_refresh().expect("refresh");
    assert_eq!(report.computed, nodes.to_vec());

    let report = generator.request_refresh().expect("refresh");
    assert!(report.computed.is_empty());
    assert_eq!(report.cache_hits, 4);
    for node in nodes {
        assert_eq!(generator.refresh_count(node), 1);
    }
}

#[test]
fn cycle_is_rejected_without_side_effects() {
    let (mut generator, [a, _, c, _]) = chain();
    generator.request_refresh().expect("refresh");
    let before = generator.graph().clone();

    let err = generator
        .connect_by_name(c, "out", a, "in")
        .expect_err("cycle");
    assert!(matches!(
        err,
        GeneratorError::Graph(GraphError::CycleDetected { .. })
    ));
    assert_eq!(generator.graph(), &before);
    assert!(!generator.is_dirty(a));
    assert!(!generator.is_dirty(c));
}

#[test]
fn dirty_reaches_exactly_the_descendants() {
    let (mut generator, [a, b, c, d]) = chain();
    generator.request_refresh().expect("refresh");

    generator.mark_dirty(b).expect("mark");
    assert!(!generator.is_dirty(a));
    assert!(generator.is_dirty(b));
    assert!(generator.is_dirty(c));
    assert!(!generator.is_dirty(d));

    let report = generator.request_refresh().expect("refresh");
    assert_eq!(report.computed, vec![b, c]);
    assert_eq!(generator.refresh_count(a), 1);
    assert_eq!(generator.refresh_count(c), 2);
}

#[test]
fn parameter_change_dirties_downstream() {
    let (mut generator, [a, b, c, d]) = chain();
    generator.request_refresh().expect("refresh");
    generator
        .set_param(a, "scale", ParamValue::Float(2.0))
        .expect("param");
    assert!(generator.is_dirty(a) && generator.is_dirty(b) && generator.is_dirty(c));
    assert!(!generator.is_dirty(d));

    let err = generator
        .set_param(a, "scale", ParamValue::Bool(true))
        .expect_err("mismatch");
    assert!(matches!(err, GeneratorError::Param(ParamError::TypeMismatch { .. })));
}

#[test]
fn failure_is_isolated_to_its_branch() {
    let (mut generator, [a, b, c, d]) = chain();
    generator
        .set_param(a, "fail", ParamValue::Bool(true))
        .expect("param");
    let report = generator.request_refresh().expect("refresh");
    assert_eq!(report.computed.len(), 4);
    assert_eq!(report.errors.len(), 1);
    assert!(report.failed(a));

    for node in [a, b, c, d] {
        assert!(!generator.is_dirty(node));
    }
    assert!(generator.output(a, 0).is_empty());
    assert!(generator.output(c, 0).is_empty());
    assert!(generator.output(d, 0).as_volume().is_some());

    let diagnostics = generator.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].node, Some(a));
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert!(generator.diagnostics().is_empty());
}

#[test]
fn disabled_module_empties_its_descendants() {
    let (mut generator, [a, b, c, _]) = chain();
    generator.request_refresh().expect("refresh");
    assert!(generator.output(c, 0).as_volume().is_some());

    generator.set_enabled(b, false).expect("disable");
    let report = generator.request_refresh().expect("refresh");
    assert_eq!(report.disabled, vec![b]);
    assert_eq!(report.computed, vec![c]);
    assert!(generator.output(b, 0).is_empty());
    assert!(generator.output(c, 0).is_empty());
    assert_eq!(generator.refresh_count(b), 1);
    assert!(generator.output(a, 0).as_volume().is_some());

    generator.set_enabled(b, true).expect("enable");
    generator.request_refresh().expect("refresh");
    assert!(generator.output(c, 0).as_volume().is_some());
}

#[test]
fn refresh_node_only_touches_its_inputs() {
    let (mut generator, [a, b, c, d]) = chain();
    let report = generator.refresh_node(b).expect("refresh");
    assert_eq!(report.computed, vec![a, b]);
    assert!(generator.is_dirty(c));
    assert!(generator.is_dirty(d));
}

#[test]
fn array_inputs_keep_link_order() {
    let mut generator = Generator::default();
    let first = generator.add_module(Probe::boxed(true));
    let second = generator.add_module(Probe::boxed(true));
    let caps = generator.add_module_by_name("Volume Caps").expect("caps");
    generator
        .connect_by_name(second, "out", caps, "holes")
        .expect("link");
    generator
        .connect_by_name(first, "out", caps, "holes")
        .expect("link");
    generator.request_refresh().expect("refresh");

    let holes = generator
        .find_pin(caps, "holes", PinKind::Input)
        .expect("pin");
    let data = generator.get_all_data(holes);
    assert_eq!(data.len(), 2);
    assert_eq!(data[0], generator.output(second, 0));
    assert_eq!(data[1], generator.output(first, 0));
}

#[test]
fn disconnect_dirties_consumer() {
    let (mut generator, [a, b, c, _]) = chain();
    generator.request_refresh().expect("refresh");
    let from = generator.find_pin(a, "out", PinKind::Output).expect("pin");
    let to = generator.find_pin(b, "in", PinKind::Input).expect("pin");
    generator.disconnect_pins(from, to).expect("disconnect");
    assert!(!generator.is_dirty(a));
    assert!(generator.is_dirty(b));
    assert!(generator.is_dirty(c));

    generator.request_refresh().expect("refresh");
    let input = generator.get_data(to);
    assert!(input.is_empty());
    assert!(generator.output(c, 0).is_empty());
    assert!(matches!(
        generator.disconnect_pins(from, to),
        Err(GeneratorError::Graph(GraphError::NotLinked { .. }))
    ));
}
