//! The fixed benchmark catalogue.
//!
//! Every [`Descriptor`] carries what the mean-payoff checker needs to analyze one model. The
//! tables below also hold the known true values of the older benchmark models and the model
//! groups used when tabulating the reachability benchmarks.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::ConfigError, formats::invocation::model_name_from_path};

/// Analysis mode passed as first argument to the tool.
pub const MEAN_PAYOFF: &str = "meanPayoff";

/// Step bounds of the bounded reachability experiments.
pub const STEP_BOUNDS: [u64; 4] = [10, 100, 200, 500];

/// Parameters of one benchmark model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Descriptor {
    pub model_path: String,
    pub max_reward: f64,
    pub p_min: f64,
    #[serde(default)]
    pub constants: Option<String>,
    #[serde(default)]
    pub reward_module: Option<String>,
    /// Further arguments appended verbatim.
    #[serde(default)]
    pub extra: Vec<String>,
}

impl Descriptor {
    pub fn new(model_path: &str, max_reward: f64, p_min: f64) -> Self {
        Self {
            model_path: model_path.to_owned(),
            max_reward,
            p_min,
            constants: None,
            reward_module: None,
            extra: Vec::new(),
        }
    }

    pub fn constants(mut self, constants: &str) -> Self {
        self.constants = Some(constants.to_owned());
        self
    }

    pub fn reward_module(mut self, module: &str) -> Self {
        self.reward_module = Some(module.to_owned());
        self
    }

    pub fn extra(mut self, args: &[&str]) -> Self {
        self.extra.extend(args.iter().map(|arg| arg.to_string()));
        self
    }

    /// The model name as it will appear in the echoed command line.
    pub fn model_name(&self) -> Result<&str, ConfigError> {
        model_name_from_path(&self.model_path)
            .ok_or_else(|| ConfigError::MalformedDescriptor(self.model_path.clone()))
    }

    /// Arguments for the analysis tool, without the launcher.
    pub fn tool_args(&self) -> Vec<String> {
        let mut args = vec![
            MEAN_PAYOFF.to_owned(),
            "-m".to_owned(),
            self.model_path.clone(),
            "--maxReward".to_owned(),
            self.max_reward.to_string(),
            "--pMin".to_owned(),
            self.p_min.to_string(),
        ];
        if let Some(constants) = &self.constants {
            args.push("--const".to_owned());
            args.push(constants.clone());
        }
        if let Some(module) = &self.reward_module {
            args.push("--rewardModule".to_owned());
            args.push(module.clone());
        }
        args.extend(self.extra.iter().cloned());
        args
    }
}

/// Which family of benchmarks to run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkSet {
    #[default]
    Mdp,
    Ctmdp,
    /// The older mean-payoff models with known values, run blackbox with greybox updates.
    Cav22,
}

impl BenchmarkSet {
    pub const ALL: [BenchmarkSet; 3] = [BenchmarkSet::Mdp, BenchmarkSet::Ctmdp, BenchmarkSet::Cav22];

    pub fn descriptors(&self) -> Vec<Descriptor> {
        match self {
            BenchmarkSet::Mdp => mdp_descriptors(),
            BenchmarkSet::Ctmdp => ctmdp_descriptors(),
            BenchmarkSet::Cav22 => cav22_descriptors(),
        }
    }

    /// Trials per model unless asked otherwise.
    pub fn default_iterations(&self) -> usize {
        match self {
            BenchmarkSet::Mdp | BenchmarkSet::Ctmdp => 1,
            BenchmarkSet::Cav22 => 5,
        }
    }
}

impl Display for BenchmarkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkSet::Mdp => write!(f, "mdp"),
            BenchmarkSet::Ctmdp => write!(f, "ctmdp"),
            BenchmarkSet::Cav22 => write!(f, "cav22"),
        }
    }
}

fn mdp_descriptors() -> Vec<Descriptor> {
    const BASE: &str = "data/mdpReachRewardModels";
    let new = |path: &str, p_min| Descriptor::new(&format!("{BASE}/{path}"), 1.0, p_min);
    vec![
        new("consensus/consensus.2-rewards.prism", 0.1083)
            .constants("K=2")
            .reward_module("disagree"),
        new("csma/csma.2-2-rewards.prism", 0.25).reward_module("some_before"),
        new("pacman/pacman-rewards.prism", 0.08)
            .constants("MAXSTEPS=5")
            .reward_module("crash"),
        new("pnueli-zuck-3/pnueli-zuck.3-rewards.prism", 0.5).reward_module("live"),
        new("rabin-3/rabin.3-rewards.prism", 0.03125).reward_module("one_critical"),
        new("wlan-0/wlan.0-rewards.prism", 0.0625)
            .constants("COL=0")
            .reward_module("sent"),
        new("zeroconf/zeroconf-rewards.prism", 0.0002)
            .constants("N=40,K=10,reset=false")
            .reward_module("correct_max"),
    ]
}

fn ctmdp_descriptors() -> Vec<Descriptor> {
    const BASE: &str = "data/ctmdpModels";
    let new = |name: &str, p_min, max_successors: &str| {
        Descriptor::new(&format!("{BASE}/{name}.prism"), 1.0, p_min).extra(&[
            "--precision",
            "0.01",
            "--revisitThreshold",
            "6",
            "--errorTolerance",
            "0.1",
            "--maxSuccessors",
            max_successors,
            "--iterSample",
            "10000",
        ])
    };
    vec![
        new("DynamicPM-tt_3_qs_2_sctmdp", 0.1516, "5"),
        new("ErlangStages-k500_r10", 0.05, "3"),
        new("PollingSystem-jt1_qs1_sctmdp", 0.107, "3"),
        new("PollingSystem-jt1_qs4_sctmdp", 0.083, "5"),
        new("PollingSystem-jt1_qs7_sctmdp", 0.083, "5"),
        new("QueuingSystem-lqs_1_rqs_1_jt_2_sctmdp", 0.0265, "7"),
        new("SJS-procn_2_jobn_2_sctmdp", 0.33, "2"),
        new("SJS-procn_2_jobn_6_sctmdp", 0.05, "3"),
        new("SJS-procn_6_jobn_2_sctmdp", 0.33, "2"),
        new("toy", 0.11, "2"),
    ]
}

fn cav22_descriptors() -> Vec<Descriptor> {
    const BASE: &str = "data/models";
    let new = |name: &str, max_reward, p_min, max_successors: Option<&str>| {
        let mut descriptor = Descriptor::new(&format!("{BASE}/{name}.prism"), max_reward, p_min)
            .extra(&["--precision", "0.01", "--revisitThreshold", "6", "--errorTolerance", "0.1"]);
        if let Some(max_successors) = max_successors {
            descriptor = descriptor.extra(&["--maxSuccessors", max_successors]);
        }
        descriptor.extra(&["--iterSample", "10000"])
    };
    vec![
        new("virus", 1.0, 0.1, Some("2")),
        new("cs_nfail3", 1.0, 0.1, Some("2")),
        new("investor", 1.0, 0.016, Some("8")),
        new("zeroconf_rewards", 1.0, 0.0002, Some("6"))
            .constants("N=40,K=10,reset=false")
            .reward_module("reach"),
        new("sensors", 1.0, 0.05, Some("2")).constants("K=3"),
        new("consensus.2", 1.0, 0.5, Some("2"))
            .constants("K=2")
            .reward_module("custom"),
        new("ij.10", 1.0, 0.5, Some("2")),
        new("ij.3", 1.0, 0.5, Some("2")),
        new("pacman", 1.0, 0.08, Some("6")).constants("MAXSTEPS=5"),
        new("wlan.0", 1.0, 0.0625, Some("16"))
            .constants("COL=0")
            .reward_module("default"),
        new("blackjack", 1.5, 0.076, Some("10")),
        new("counter", 10.0, 0.333, Some("2")),
        new("recycling", 2.0, 0.199, Some("2")),
        new("busyRing4", 1.0, 0.125, None),
        new("busyRingMC4", 1.0, 0.0625, None),
    ]
}

/// Known mean payoff values of the benchmark models.
pub fn true_values() -> Vec<(&'static str, f64)> {
    vec![
        ("zeroconf_rewards", 1.0),
        ("sensors", 0.333),
        ("investor", 0.95),
        ("cs_nfail3", 0.333),
        ("consensus.2", 0.1083),
        ("ij.10", 1.0),
        ("ij.3", 1.0),
        ("pacman", 0.5511),
        ("pnueli-zuck.3", 1.0),
        ("wlan.0", 1.0),
        ("virus", 0.0),
        ("phil-nofair3", 2.4286),
        ("blackjack", 0.0),
        ("counter", 5.0),
        ("recycling", 1.454),
        ("busyRing4", 1.0),
        ("busyRingMC4", 1.0),
        ("DynamicPM-tt_3_qs_2_sctmdp", 1.0),
        ("ErlangStages-k500_r10", 1.0),
        ("PollingSystem-jt1_qs1_sctmdp", 0.922),
        ("PollingSystem-jt1_qs4_sctmdp", 0.999),
        ("PollingSystem-jt1_qs7_sctmdp", 0.999),
        ("QueuingSystem-lqs_1_rqs_1_jt_2_sctmdp", 0.8783),
        ("SJS-procn_2_jobn_2_sctmdp", 1.0),
        ("SJS-procn_2_jobn_6_sctmdp", 0.999),
        ("SJS-procn_6_jobn_2_sctmdp", 1.0),
        ("toy", 1.0),
    ]
}

/// Exploration heuristics of the reachability benchmarks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Heuristic {
    Weighted,
    Prob,
    Difference,
    GraphWeighted,
    GraphDifference,
}

impl Heuristic {
    pub const ALL: [Heuristic; 5] = [
        Heuristic::Weighted,
        Heuristic::Prob,
        Heuristic::Difference,
        Heuristic::GraphWeighted,
        Heuristic::GraphDifference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Heuristic::Weighted => "WEIGHTED",
            Heuristic::Prob => "PROB",
            Heuristic::Difference => "DIFFERENCE",
            Heuristic::GraphWeighted => "GRAPH_WEIGHTED",
            Heuristic::GraphDifference => "GRAPH_DIFFERENCE",
        }
    }

    /// Short column name for LaTeX tables.
    pub fn latex_name(&self) -> &'static str {
        match self {
            Heuristic::Weighted => "\\texttt{W}",
            Heuristic::Prob => "\\texttt{P}",
            Heuristic::Difference => "\\texttt{D}",
            Heuristic::GraphWeighted => "\\texttt{GW}",
            Heuristic::GraphDifference => "\\texttt{GD}",
        }
    }
}

impl Display for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Heuristic {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Heuristic::ALL
            .into_iter()
            .find(|heuristic| heuristic.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownHeuristic(s.to_owned()))
    }
}

/// Model files of the reachability benchmarks grouped by family, in table order.
pub fn model_groups() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            "csma",
            vec![
                "csma2_2.nm", "csma2_4.nm", "csma2_6.nm", "csma3_2.nm", "csma3_4.nm",
                "csma3_6.nm", "csma4_2.nm", "csma4_4.nm", "csma4_6.nm",
            ],
        ),
        ("brp", vec!["brp.pm"]),
        ("cluster", vec!["cluster.sm"]),
        ("coin", vec!["coin2.nm", "coin4.nm"]),
        ("crowds", vec!["crowds.pm"]),
        ("egl", vec!["egl.pm"]),
        ("embedded", vec!["embedded.sm"]),
        (
            "firewire",
            vec!["firewire.nm", "firewire_abst.nm", "firewire_dl.nm", "firewire_impl_dl.nm"],
        ),
        ("fms", vec!["fms.sm"]),
        (
            "herman",
            vec![
                "herman11.pm", "herman13.pm", "herman15.pm", "herman3.pm", "herman5.pm",
                "herman7.pm", "herman9.pm",
            ],
        ),
        ("kanban", vec!["kanban.sm"]),
        (
            "leader\\_sync",
            vec![
                "leader_sync3_2.pm", "leader_sync3_3.pm", "leader_sync3_4.pm",
                "leader_sync4_2.pm", "leader_sync4_3.pm", "leader_sync4_4.pm",
                "leader_sync5_2.pm", "leader_sync5_3.pm", "leader_sync5_4.pm",
            ],
        ),
        ("mapk\\_cascade", vec!["mapk_cascade.sm"]),
        ("nand", vec!["nand.pm"]),
        (
            "poll",
            vec![
                "poll10.sm", "poll11.sm", "poll12.sm", "poll13.sm", "poll14.sm", "poll15.sm",
                "poll16.sm", "poll17.sm", "poll18.sm", "poll19.sm", "poll20.sm", "poll3.sm",
                "poll4.sm", "poll5.sm", "poll6.sm", "poll7.sm", "poll8.sm", "poll9.sm",
            ],
        ),
        ("tandem", vec!["tandem.sm"]),
        (
            "wlan",
            vec![
                "wlan0.nm", "wlan1.nm", "wlan2.nm", "wlan3.nm", "wlan4.nm", "wlan5.nm",
                "wlan6.nm",
            ],
        ),
        (
            "wlan\\_dl",
            vec![
                "wlan_dl0.nm", "wlan_dl1.nm", "wlan_dl2.nm", "wlan_dl3.nm", "wlan_dl4.nm",
                "wlan_dl5.nm", "wlan_dl6.nm",
            ],
        ),
        ("zeroconf", vec!["zeroconf.nm"]),
        ("zeroconf\\_dl", vec!["zeroconf_dl.nm"]),
    ]
}
