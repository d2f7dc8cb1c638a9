//! JSON Schema export
//!
//! Schemas are generated from the same types the decoders produce, so the
//! published documents and the runtime checks describe one contract. The
//! derive cannot see the payload policies of [`InputPayload`] and
//! [`ResultsPayload`], so the envelope generators apply them afterwards.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, NumberValidation, RootSchema, Schema, SchemaObject};
use schemars::schema_for;

use crate::callback::ValidationCallback;
use crate::decode::Bound;
use crate::energyplus::{EnergyPlusInputs, EnergyPlusOutputs};
use crate::envelope::{InputEnvelope, InputPayload, OpenMap, OutputEnvelope, ResultsPayload};
use crate::fmu::{FmuInputs, FmuOutputs, ProbeResult};
use crate::registry::Family;

/// Input envelope schema; the base schema when `family` is `None`.
pub fn input_schema(family: Option<Family>) -> RootSchema {
    match family {
        None => input_envelope::<OpenMap>(),
        Some(Family::EnergyPlus) => input_envelope::<EnergyPlusInputs>(),
        Some(Family::Fmu) => input_envelope::<FmuInputs>(),
    }
}

/// Output envelope schema; the base schema when `family` is `None`.
pub fn output_schema(family: Option<Family>) -> RootSchema {
    match family {
        None => output_envelope::<OpenMap>(),
        Some(Family::EnergyPlus) => output_envelope::<EnergyPlusOutputs>(),
        Some(Family::Fmu) => output_envelope::<FmuOutputs>(),
    }
}

pub fn callback_schema() -> RootSchema {
    schema_for!(ValidationCallback)
}

pub fn probe_schema() -> RootSchema {
    schema_for!(ProbeResult)
}

fn input_envelope<P: InputPayload>() -> RootSchema {
    let mut root = SchemaGenerator::default().into_root_schema_for::<InputEnvelope<P>>();
    if let Some(fallback) = P::when_absent() {
        let object = root.schema.object();
        object.required.remove("inputs");
        if let Some(Schema::Object(inputs)) = object.properties.get_mut("inputs") {
            inputs.metadata().default = serde_json::to_value(fallback).ok();
        }
    }
    root
}

fn output_envelope<R: ResultsPayload>() -> RootSchema {
    let mut gen = SchemaGenerator::default();
    let results = gen.subschema_for::<R>();
    let mut root = gen.into_root_schema_for::<OutputEnvelope<R>>();
    if !R::NULLABLE {
        let object = root.schema.object();
        object.required.insert("outputs".to_owned());
        object.properties.insert("outputs".to_owned(), results);
    }
    root
}

// ============================================================================
// Numeric bounds
// ============================================================================
//
// `schema_with` targets for fields the decoder checks against a [`Bound`].

fn bounded(instance: InstanceType, bound: Bound, nullable: bool) -> Schema {
    let mut number = NumberValidation::default();
    match bound {
        Bound::AtLeast(min) => number.minimum = Some(min),
        Bound::GreaterThan(min) => number.exclusive_minimum = Some(min),
        Bound::Between(min, max) => {
            number.minimum = Some(min);
            number.maximum = Some(max);
        }
    }
    let instance_type = if nullable {
        vec![instance, InstanceType::Null].into()
    } else {
        instance.into()
    };
    Schema::Object(SchemaObject {
        instance_type: Some(instance_type),
        number: Some(Box::new(number)),
        ..Default::default()
    })
}

pub(crate) fn non_negative_number(_: &mut SchemaGenerator) -> Schema {
    bounded(InstanceType::Number, Bound::NON_NEGATIVE, false)
}

pub(crate) fn positive_number(_: &mut SchemaGenerator) -> Schema {
    bounded(InstanceType::Number, Bound::POSITIVE, false)
}

pub(crate) fn optional_positive_number(_: &mut SchemaGenerator) -> Schema {
    bounded(InstanceType::Number, Bound::POSITIVE, true)
}

pub(crate) fn optional_non_negative_number(_: &mut SchemaGenerator) -> Schema {
    bounded(InstanceType::Number, Bound::NON_NEGATIVE, true)
}

pub(crate) fn optional_non_negative_integer(_: &mut SchemaGenerator) -> Schema {
    bounded(InstanceType::Integer, Bound::NON_NEGATIVE, true)
}
