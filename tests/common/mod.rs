//! Shared test backend: a deterministic scripted model.

use std::sync::Arc;

use tandem::config::{RuntimeConfig, SpeculationConfig};
use tandem::core::Coordinator;
use tandem::engine::{DraftEngine, TargetEngine};
use tandem::error::{Error, Result};
use tandem::model::{LanguageModel, LogitMode, Token};

/// End-of-generation sentinel used by scripted models.
pub const EOG: Token = 2;

/// Deterministic model whose greedy continuation is a pure function of the
/// context prefix. The position-indexed cache contract is enforced exactly,
/// so any engine that mis-trims or mis-positions a batch fails the test
/// instead of silently producing garbage.
pub struct ScriptedModel {
    rule: Arc<dyn Fn(&[Token]) -> Token + Send + Sync>,
    ctx: Vec<Token>,
}

impl ScriptedModel {
    pub fn new(rule: impl Fn(&[Token]) -> Token + Send + Sync + 'static) -> Self {
        Self {
            rule: Arc::new(rule),
            ctx: Vec::new(),
        }
    }

    /// A model that treats `script` as its canonical sequence: contexts that
    /// are a prefix of the script continue it, a context that consumed the
    /// whole script ends generation, and off-script contexts produce a
    /// context-dependent filler above `junk_base`.
    pub fn follows(script: Vec<Token>, junk_base: Token) -> Self {
        Self::new(move |ctx| {
            if ctx.len() < script.len() && script[..ctx.len()] == *ctx {
                script[ctx.len()]
            } else if ctx.len() >= script.len() && ctx[..script.len()] == *script {
                EOG
            } else {
                junk_base + fold_hash(ctx) % 50
            }
        })
    }

    /// A drafter that proposes the same token no matter the context.
    pub fn constant(token: Token) -> Self {
        Self::new(move |_| token)
    }

    /// A fresh instance sharing this model's rule (same weights, new cache).
    pub fn fresh(&self) -> Self {
        Self {
            rule: Arc::clone(&self.rule),
            ctx: Vec::new(),
        }
    }
}

fn fold_hash(ctx: &[Token]) -> Token {
    ctx.iter()
        .fold(17u32, |acc, &t| acc.wrapping_mul(31).wrapping_add(t))
}

impl LanguageModel for ScriptedModel {
    fn decode(&mut self, tokens: &[Token], first_pos: usize, mode: LogitMode) -> Result<Vec<Token>> {
        if tokens.is_empty() {
            return Err(Error::Decode("empty decode batch".into()));
        }
        if first_pos != self.ctx.len() {
            return Err(Error::CachePosition {
                expected: self.ctx.len(),
                got: first_pos,
            });
        }
        self.ctx.extend_from_slice(tokens);
        Ok(match mode {
            LogitMode::Last => vec![(self.rule)(&self.ctx)],
            LogitMode::All => (first_pos..self.ctx.len())
                .map(|p| (self.rule)(&self.ctx[..p + 1]))
                .collect(),
        })
    }

    fn forget_from(&mut self, pos: usize) {
        self.ctx.truncate(pos);
    }

    fn n_cached(&self) -> usize {
        self.ctx.len()
    }

    fn is_eog(&self, token: Token) -> bool {
        token == EOG
    }

    fn n_vocab(&self) -> usize {
        1 << 16
    }
}

/// What the target alone would produce, decoding one token at a time.
pub fn sequential_greedy(model: &ScriptedModel, prompt: &[Token], max_new: usize) -> Vec<Token> {
    let mut model = model.fresh();
    let mut next = model
        .decode(prompt, 0, LogitMode::Last)
        .expect("prompt decode")[0];
    let mut output = Vec::new();
    let mut pos = prompt.len();
    for _ in 0..max_new {
        if model.is_eog(next) {
            break;
        }
        output.push(next);
        next = model.decode(&[next], pos, LogitMode::Last).expect("decode")[0];
        pos += 1;
    }
    output
}

/// Run one request through the full local pipeline: drafter thread, target
/// thread, turn-based coordinator. Returns the committed output and the
/// per-step commit batches.
pub fn run_duo(
    target: ScriptedModel,
    draft: ScriptedModel,
    prompt: &[Token],
    max_new: usize,
    n_draft: usize,
) -> (Vec<Token>, Vec<Vec<Token>>) {
    let runtime = RuntimeConfig::default();
    let spec = SpeculationConfig {
        n_draft,
        ..Default::default()
    };
    let coordinator = Arc::new(Coordinator::new(prompt.to_vec()));

    let drafter = std::thread::spawn({
        let coordinator = Arc::clone(&coordinator);
        let prompt = prompt.to_vec();
        let runtime = runtime.clone();
        move || DraftEngine::new(draft, runtime, spec).run(&prompt, &coordinator)
    });

    let mut commits = Vec::new();
    let output = TargetEngine::new(target, runtime)
        .run(prompt, max_new, &*coordinator, &mut |tokens| {
            commits.push(tokens.to_vec());
        })
        .expect("target run");

    drafter
        .join()
        .expect("drafter thread")
        .expect("drafter run");
    (output, commits)
}
