/*!
# Transforms

Documents are never edited in place. A [`Transform`] records a list of
[`Step`]s, each of which turns one document into the next and reports how
positions move through it as a [`StepMap`].

```text
before ──step 1──▶ doc₁ ──step 2──▶ doc₂ ... ──▶ doc
          map 1              map 2
```

Positions known in the `before` document are carried forward with
[`Transform::mapping`]. The structure queries in [`structure`] answer
"would this step succeed" without building it.
*/

pub mod map;
pub mod step;
pub mod structure;
#[allow(clippy::module_inception)]
mod transform;

pub use map::{Assoc, MapResult, Mapping, StepMap};
pub use step::{Step, StepError};
pub use structure::{NodeTemplate, can_join, can_split, joinable, lift_target};
pub use transform::Transform;
