//! Node graph and block renderer.
//!
//! Only nodes upstream of the destination are processed, in dependency
//! order. The order is recomputed on the control thread whenever the
//! connections change; a render pass itself never allocates.

use std::collections::{HashMap, HashSet};

use super::param::AudioParam;
use super::worklet::AudioProcessor;
use super::{NodeId, NodeKind, Param, RENDER_QUANTUM};
use crate::dsp::analyser::SpectrumAnalyser;
use crate::dsp::filter::{BiquadFilter, FilterType};
use crate::dsp::mixer::{Mixer, hard_clip};
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::error::EngineError;

/// Lifecycle of a scheduled source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Unscheduled,
    Playing,
    Stopped,
}

enum NodeBody {
    Destination,
    Gain {
        gain: AudioParam,
    },
    Oscillator {
        osc: Oscillator,
        frequency: AudioParam,
        playback: Playback,
    },
    Biquad {
        filter: BiquadFilter,
        frequency: AudioParam,
        q: AudioParam,
    },
    Analyser {
        analyser: SpectrumAnalyser,
    },
    Processor {
        processor: Box<dyn AudioProcessor>,
        alive: bool,
    },
}

struct NodeEntry {
    body: NodeBody,
    output: Vec<f32>,
}

impl NodeEntry {
    fn kind(&self) -> NodeKind {
        match &self.body {
            NodeBody::Destination => NodeKind::Destination,
            NodeBody::Gain { .. } => NodeKind::Gain,
            NodeBody::Oscillator { osc, .. } => NodeKind::Oscillator(osc.waveform()),
            NodeBody::Biquad { filter, .. } => NodeKind::BiquadFilter(filter.filter_type()),
            NodeBody::Analyser { .. } => NodeKind::Analyser,
            NodeBody::Processor { .. } => NodeKind::Processor,
        }
    }

    fn param_mut(&mut self, param: Param) -> Option<&mut AudioParam> {
        match (&mut self.body, param) {
            (NodeBody::Gain { gain }, Param::Gain) => Some(gain),
            (NodeBody::Oscillator { frequency, .. }, Param::Frequency) => Some(frequency),
            (NodeBody::Biquad { frequency, .. }, Param::Frequency) => Some(frequency),
            (NodeBody::Biquad { q, .. }, Param::Q) => Some(q),
            _ => None,
        }
    }

    fn process(&mut self, input: &[f32], frames: usize) {
        let out = &mut self.output[..frames];
        match &mut self.body {
            NodeBody::Destination => {
                for (o, &x) in out.iter_mut().zip(input) {
                    *o = hard_clip(x);
                }
            }
            NodeBody::Gain { gain } => {
                for (o, &x) in out.iter_mut().zip(input) {
                    *o = x * gain.next_smoothed() as f32;
                }
            }
            NodeBody::Oscillator {
                osc,
                frequency,
                playback,
            } => {
                if *playback == Playback::Playing {
                    osc.set_frequency(frequency.block_value());
                    osc.fill(out);
                } else {
                    out.fill(0.0);
                }
            }
            NodeBody::Biquad {
                filter,
                frequency,
                q,
            } => {
                filter.set_frequency(frequency.block_value());
                filter.set_q(q.block_value());
                filter.process_block(input, out);
            }
            NodeBody::Analyser { analyser } => {
                out.copy_from_slice(input);
                analyser.capture(input);
            }
            NodeBody::Processor { processor, alive } => {
                if *alive {
                    *alive = processor.process(input, out);
                } else {
                    out.fill(0.0);
                }
            }
        }
    }
}

pub struct Graph {
    sample_rate: f64,
    nodes: HashMap<NodeId, NodeEntry>,
    edges: Vec<(NodeId, NodeId)>,
    order: Vec<NodeId>,
    input: Mixer,
    destination: NodeId,
    next_id: u32,
}

impl Graph {
    pub fn new(sample_rate: f64) -> Self {
        let mut graph = Graph {
            sample_rate,
            nodes: HashMap::new(),
            edges: Vec::new(),
            order: Vec::new(),
            input: Mixer::with_capacity(RENDER_QUANTUM),
            destination: NodeId(0),
            next_id: 0,
        };
        graph.destination = graph.insert(NodeBody::Destination);
        graph.rebuild_order();
        graph
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    fn insert(&mut self, body: NodeBody) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            NodeEntry {
                body,
                output: vec![0.0; RENDER_QUANTUM],
            },
        );
        id
    }

    pub fn add_gain(&mut self) -> NodeId {
        let gain = AudioParam::new(Param::Gain, 1.0, f64::MIN, f64::MAX, self.sample_rate);
        self.insert(NodeBody::Gain { gain })
    }

    pub fn add_oscillator(&mut self, waveform: Waveform) -> NodeId {
        let nyquist = self.sample_rate / 2.0;
        let frequency =
            AudioParam::new(Param::Frequency, 440.0, -nyquist, nyquist, self.sample_rate);
        self.insert(NodeBody::Oscillator {
            osc: Oscillator::new(waveform, self.sample_rate),
            frequency,
            playback: Playback::Unscheduled,
        })
    }

    pub fn add_biquad(&mut self, filter_type: FilterType) -> NodeId {
        let nyquist = self.sample_rate / 2.0;
        let frequency = AudioParam::new(Param::Frequency, 350.0, 0.0, nyquist, self.sample_rate);
        let q = AudioParam::new(Param::Q, 1.0, f64::MIN, f64::MAX, self.sample_rate);
        self.insert(NodeBody::Biquad {
            filter: BiquadFilter::new(filter_type, self.sample_rate),
            frequency,
            q,
        })
    }

    pub fn add_analyser(&mut self, fft_size: usize) -> Result<NodeId, EngineError> {
        let analyser = SpectrumAnalyser::new(fft_size).map_err(|_| {
            EngineError::InvalidState("analyser FFT size must be a power of two in 32..=32768")
        })?;
        Ok(self.insert(NodeBody::Analyser { analyser }))
    }

    pub fn add_processor(&mut self, processor: Box<dyn AudioProcessor>) -> NodeId {
        self.insert(NodeBody::Processor {
            processor,
            alive: true,
        })
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry, EngineError> {
        self.nodes.get(&id).ok_or(EngineError::UnknownNode(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, EngineError> {
        self.nodes.get_mut(&id).ok_or(EngineError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(NodeEntry::kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        self.entry(from)?;
        self.entry(to)?;
        if from == self.destination {
            return Err(EngineError::InvalidConnection("the destination has no output"));
        }
        if from == to || self.reaches(to, from) {
            return Err(EngineError::InvalidConnection("connection would create a cycle"));
        }
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
            self.rebuild_order();
        }
        Ok(())
    }

    pub fn disconnect(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.entry(node)?;
        self.edges.retain(|&(from, _)| from != node);
        self.rebuild_order();
        Ok(())
    }

    pub fn remove(&mut self, node: NodeId) -> Result<(), EngineError> {
        if node == self.destination {
            return Err(EngineError::InvalidState("the destination cannot be released"));
        }
        self.nodes
            .remove(&node)
            .ok_or(EngineError::UnknownNode(node))?;
        self.edges.retain(|&(from, to)| from != node && to != node);
        self.rebuild_order();
        Ok(())
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains(&(from, to))
    }

    pub fn outputs_of(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|&&(from, _)| from == node)
            .map(|&(_, to)| to)
            .collect()
    }

    /// Nodes the next render pass will process, sources first.
    pub fn render_order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn start(&mut self, node: NodeId) -> Result<(), EngineError> {
        match &mut self.entry_mut(node)?.body {
            NodeBody::Oscillator { playback, .. } => match playback {
                Playback::Unscheduled => {
                    *playback = Playback::Playing;
                    Ok(())
                }
                _ => Err(EngineError::InvalidState("a source can only be started once")),
            },
            _ => Err(EngineError::InvalidState("node is not a scheduled source")),
        }
    }

    pub fn stop(&mut self, node: NodeId) -> Result<(), EngineError> {
        match &mut self.entry_mut(node)?.body {
            NodeBody::Oscillator { playback, .. } => match playback {
                Playback::Unscheduled => {
                    Err(EngineError::InvalidState("cannot stop a source that was never started"))
                }
                _ => {
                    *playback = Playback::Stopped;
                    Ok(())
                }
            },
            _ => Err(EngineError::InvalidState("node is not a scheduled source")),
        }
    }

    pub fn playback(&self, node: NodeId) -> Option<Playback> {
        match self.nodes.get(&node).map(|e| &e.body) {
            Some(NodeBody::Oscillator { playback, .. }) => Some(*playback),
            _ => None,
        }
    }

    pub fn set_param(&mut self, node: NodeId, param: Param, value: f64) -> Result<(), EngineError> {
        self.entry_mut(node)?
            .param_mut(param)
            .ok_or(EngineError::UnsupportedParam { node, param })?
            .set_value(value)
    }

    pub fn param(&mut self, node: NodeId, param: Param) -> Result<f64, EngineError> {
        self.entry_mut(node)?
            .param_mut(param)
            .map(|p| p.value())
            .ok_or(EngineError::UnsupportedParam { node, param })
    }

    fn analyser_mut(&mut self, node: NodeId) -> Result<&mut SpectrumAnalyser, EngineError> {
        match &mut self.entry_mut(node)?.body {
            NodeBody::Analyser { analyser } => Ok(analyser),
            _ => Err(EngineError::InvalidState("node is not an analyser")),
        }
    }

    pub fn frequency_bin_count(&mut self, node: NodeId) -> Result<usize, EngineError> {
        Ok(self.analyser_mut(node)?.frequency_bin_count())
    }

    pub fn byte_frequency_data(&mut self, node: NodeId, out: &mut [u8]) -> Result<(), EngineError> {
        self.analyser_mut(node)?.byte_frequency_data(out);
        Ok(())
    }

    /// Render one block of at most `RENDER_QUANTUM` frames and return the
    /// destination's output.
    pub fn render_block(&mut self, frames: usize) -> &[f32] {
        let frames = frames.min(RENDER_QUANTUM);
        let Graph {
            nodes,
            edges,
            order,
            input,
            destination,
            ..
        } = self;

        for &id in order.iter() {
            input.clear(frames);
            for &(from, to) in edges.iter() {
                if to == id {
                    if let Some(source) = nodes.get(&from) {
                        input.add(&source.output[..frames]);
                    }
                }
            }
            if let Some(entry) = nodes.get_mut(&id) {
                entry.process(input.output(), frames);
            }
        }

        match nodes.get(&*destination) {
            Some(entry) => &entry.output[..frames],
            None => &[],
        }
    }

    /// True if `target` is reachable from `start` along connections.
    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if seen.insert(node) {
                stack.extend(
                    self.edges
                        .iter()
                        .filter(|&&(from, _)| from == node)
                        .map(|&(_, to)| to),
                );
            }
        }
        false
    }

    fn rebuild_order(&mut self) {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut seen = HashSet::new();
        self.visit_upstream(self.destination, &mut seen, &mut order);
        self.order = order;
    }

    /// Post-order walk against the edge direction: inputs before consumers.
    fn visit_upstream(&self, node: NodeId, seen: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !seen.insert(node) {
            return;
        }
        for &(from, to) in &self.edges {
            if to == node {
                self.visit_upstream(from, seen, order);
            }
        }
        order.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dc(f32);

    impl AudioProcessor for Dc {
        fn process(&mut self, _input: &[f32], output: &mut [f32]) -> bool {
            output.fill(self.0);
            true
        }
    }

    #[test]
    fn empty_graph_renders_silence() {
        let mut g = Graph::new(44100.0);
        let out = g.render_block(RENDER_QUANTUM);
        assert_eq!(out.len(), RENDER_QUANTUM);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn gain_scales_its_input() {
        let mut g = Graph::new(44100.0);
        let src = g.add_processor(Box::new(Dc(0.5)));
        let gain = g.add_gain();
        g.set_param(gain, Param::Gain, 0.5).unwrap();
        g.connect(src, gain).unwrap();
        g.connect(gain, g.destination()).unwrap();

        let out = g.render_block(64);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn inputs_are_summed_and_clipped_at_destination() {
        let mut g = Graph::new(44100.0);
        let a = g.add_processor(Box::new(Dc(0.75)));
        let b = g.add_processor(Box::new(Dc(0.75)));
        let dest = g.destination();
        g.connect(a, dest).unwrap();
        g.connect(b, dest).unwrap();
        assert!(g.render_block(8).iter().all(|&s| s == 1.0));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut g = Graph::new(44100.0);
        let a = g.add_gain();
        let b = g.add_gain();
        g.connect(a, b).unwrap();
        assert!(matches!(
            g.connect(b, a),
            Err(EngineError::InvalidConnection(_))
        ));
        assert!(g.connect(a, a).is_err());
    }

    #[test]
    fn disconnected_nodes_leave_the_render_order() {
        let mut g = Graph::new(44100.0);
        let osc = g.add_oscillator(Waveform::Sine);
        g.connect(osc, g.destination()).unwrap();
        assert!(g.render_order().contains(&osc));

        g.disconnect(osc).unwrap();
        assert!(!g.render_order().contains(&osc));
        assert!(g.contains(osc));
    }

    #[test]
    fn remove_drops_incoming_and_outgoing_edges() {
        let mut g = Graph::new(44100.0);
        let src = g.add_processor(Box::new(Dc(1.0)));
        let filter = g.add_biquad(FilterType::Notch);
        g.connect(src, filter).unwrap();
        g.connect(filter, g.destination()).unwrap();

        g.remove(filter).unwrap();
        assert!(!g.contains(filter));
        assert!(g.outputs_of(src).is_empty());
        assert!(matches!(g.remove(filter), Err(EngineError::UnknownNode(_))));
        assert!(g.remove(g.destination()).is_err());
    }

    #[test]
    fn oscillator_lifecycle_is_start_once_then_stop() {
        let mut g = Graph::new(44100.0);
        let osc = g.add_oscillator(Waveform::Sine);
        assert!(g.stop(osc).is_err());
        g.start(osc).unwrap();
        assert!(g.start(osc).is_err());
        g.stop(osc).unwrap();
        assert_eq!(g.playback(osc), Some(Playback::Stopped));
    }

    #[test]
    fn stopped_oscillator_is_silent() {
        let mut g = Graph::new(44100.0);
        let osc = g.add_oscillator(Waveform::Square);
        g.connect(osc, g.destination()).unwrap();
        g.start(osc).unwrap();
        assert!(g.render_block(128).iter().any(|&s| s != 0.0));

        g.stop(osc).unwrap();
        assert!(g.render_block(128).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn params_are_node_specific() {
        let mut g = Graph::new(44100.0);
        let gain = g.add_gain();
        let filter = g.add_biquad(FilterType::Notch);
        assert!(matches!(
            g.set_param(gain, Param::Q, 1.0),
            Err(EngineError::UnsupportedParam { .. })
        ));
        g.set_param(filter, Param::Q, 4.0).unwrap();
        g.set_param(filter, Param::Frequency, 440.0).unwrap();
        assert_eq!(g.param(filter, Param::Q).unwrap(), 4.0);
        assert_eq!(g.param(filter, Param::Frequency).unwrap(), 440.0);
    }
}
