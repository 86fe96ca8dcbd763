//! Content selectors.
//!
//! A selector evaluates its path expressions to keys and walks a local
//! content item with them. URIs look like `local:<content>/<item>`.

use pdp_core::content::ShardRequest;
use pdp_core::{
    Aggregation, BuildError, BuildErrorKind, EvalError, EvalErrorKind, Type, Value,
};
use tracing::debug;

use super::Expression;
use crate::context::Context;

const LOCAL_SCHEME: &str = "local:";

/// Fallbacks and aggregation of a selector.
#[derive(Debug, Clone, Default)]
pub struct SelectorOptions {
    /// Substitutes a missing entry.
    pub default: Option<Expression>,
    /// Substitutes any other evaluation error (and a miss without default).
    pub error: Option<Expression>,
    pub aggregation: Option<Aggregation>,
}

#[derive(Debug)]
pub struct Selector {
    content: String,
    item: String,
    path: Vec<Expression>,
    ty: Type,
    opts: SelectorOptions,
}

impl Selector {
    pub(crate) fn new(
        uri: &str,
        path: Vec<Expression>,
        ty: Type,
        opts: SelectorOptions,
    ) -> Result<Self, BuildError> {
        let (content, item) = parse_uri(uri)?;

        for (which, fallback) in [("default", &opts.default), ("error", &opts.error)] {
            if let Some(e) = fallback {
                if e.result_type() != ty {
                    return Err(BuildError::new(BuildErrorKind::SelectorFallbackType {
                        which,
                        expected: ty,
                        actual: e.result_type(),
                    }));
                }
            }
        }

        if opts.aggregation.is_some() && ty != Type::ListOfStrings {
            return Err(BuildError::new(BuildErrorKind::AggregationType(ty)));
        }

        for (i, e) in path.iter().enumerate() {
            if !is_path_type(e.result_type()) {
                return Err(BuildError::new(BuildErrorKind::SelectorKeyType(e.result_type()))
                    .bind(format!("path #{i}")));
            }
        }

        Ok(Self {
            content,
            item,
            path,
            ty,
            opts,
        })
    }

    pub fn result_type(&self) -> Type {
        self.ty
    }

    pub fn uri(&self) -> String {
        format!("{LOCAL_SCHEME}{}/{}", self.content, self.item)
    }

    pub fn describe(&self) -> String {
        format!("selector({})", self.uri())
    }

    pub fn calculate(&self, ctx: &Context) -> Result<Value, EvalError> {
        let err = match self.lookup(ctx) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        if err.is_missing_value() {
            if let Some(d) = &self.opts.default {
                return d.calculate(ctx).map_err(|e| e.bind("default").bind(self.describe()));
            }
        }
        match &self.opts.error {
            Some(x) => x.calculate(ctx).map_err(|e| e.bind("error").bind(self.describe())),
            None => Err(err.bind(self.describe())),
        }
    }

    fn lookup(&self, ctx: &Context) -> Result<Value, EvalError> {
        let keys = self
            .path
            .iter()
            .enumerate()
            .map(|(i, e)| e.calculate(ctx).map_err(|err| err.bind(format!("path #{i}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let storage = ctx
            .content()
            .ok_or_else(|| EvalError::new(EvalErrorKind::MissingContent(self.content.clone())))?;
        let item = storage.get(&self.content, &self.item)?;

        let compatible = match self.opts.aggregation {
            None => item.value_type() == self.ty,
            Some(_) => matches!(item.value_type(), Type::ListOfStrings | Type::String),
        };
        if !compatible {
            return Err(EvalErrorKind::InvalidContentItemType {
                expected: self.ty,
                actual: item.value_type(),
            }
            .into());
        }

        if let Some(Value::String(first)) = keys.first() {
            if let Some(shard) = item.shard_for(first).filter(|s| s.is_remote()) {
                return self.resolve_remote(ctx, shard, &keys);
            }
        }

        item.lookup(&keys, self.opts.aggregation)
    }

    fn resolve_remote(
        &self,
        ctx: &Context,
        shard: &pdp_core::Shard,
        keys: &[Value],
    ) -> Result<Value, EvalError> {
        let shard_error = |reason: String| {
            EvalError::new(EvalErrorKind::ShardResolver {
                shard: shard.name.clone(),
                reason,
            })
        };

        let resolver = ctx
            .shard_resolver()
            .ok_or_else(|| shard_error("no shard resolver".into()))?;

        debug!(
            content = %self.content,
            item = %self.item,
            shard = %shard.name,
            "delegating lookup to shard resolver"
        );
        let v = resolver
            .resolve(&ShardRequest {
                shard,
                content: &self.content,
                item: &self.item,
                path: keys,
                value_type: self.ty,
            })
            .map_err(shard_error)?;

        if v.value_type() != self.ty {
            return Err(EvalErrorKind::ValueType {
                expected: self.ty,
                actual: v.value_type(),
            }
            .into());
        }
        Ok(v)
    }
}

fn parse_uri(uri: &str) -> Result<(String, String), BuildError> {
    let invalid = || BuildError::new(BuildErrorKind::InvalidContentUri(uri.to_string()));

    let rest = uri.strip_prefix(LOCAL_SCHEME).ok_or_else(invalid)?;
    let (content, item) = rest.split_once('/').ok_or_else(invalid)?;
    if content.is_empty() || item.is_empty() || item.contains('/') {
        return Err(invalid());
    }
    Ok((content.to_string(), item.to_string()))
}

fn is_path_type(t: Type) -> bool {
    t.is_content_key()
        || matches!(
            t,
            Type::SetOfStrings | Type::ListOfStrings | Type::SetOfNetworks | Type::SetOfDomains
        )
}
