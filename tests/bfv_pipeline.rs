//! End-to-end BFV: parameters, keys, batched integer arithmetic, persistence.

use heron::{
    BfvEncoder, BfvEncryptionParametersBuilder, BfvEvaluator, CoefficientModulus, Context,
    Decryptor, Encryptor, FromBytes, KeyGenerator, PlainModulus, SecurityLevel, ToBytes,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn context() -> Context {
    let parms = BfvEncryptionParametersBuilder::new()
        .set_poly_modulus_degree(1024)
        .set_coefficient_modulus(CoefficientModulus::create(1024, &[54, 54]).unwrap())
        .set_plain_modulus(PlainModulus::batching(1024, 20).unwrap())
        .build()
        .unwrap();
    Context::new(&parms, true, SecurityLevel::None).unwrap()
}

#[test]
fn encrypted_vector_arithmetic_is_exact() {
    let context = context();
    let mut rng = ChaCha20Rng::seed_from_u64(1001);
    let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
    let encoder = BfvEncoder::new(&context).unwrap();
    let encryptor = Encryptor::with_public_key(
        &context,
        generator.create_public_key_with_rng(&mut rng),
    )
    .unwrap();
    let decryptor = Decryptor::new(&context, generator.secret_key().clone()).unwrap();
    let evaluator = BfvEvaluator::new(&context).unwrap();
    let relin = generator.create_relinearization_key_with_rng(&mut rng);

    // Magnitudes in [-16, 16) keep every product well inside the plain modulus.
    let a: Vec<i64> = (0..16).map(|i| i - 8).collect();
    let b: Vec<i64> = (0..16).map(|i| 2 * i - 16).collect();
    let ct_a = encryptor
        .encrypt_with_rng(&encoder.encode_int(&a).unwrap(), &mut rng)
        .unwrap();
    let ct_b = encryptor
        .encrypt_with_rng(&encoder.encode_int(&b).unwrap(), &mut rng)
        .unwrap();

    let sum = evaluator.add(&ct_a, &ct_b).unwrap();
    let decoded = encoder.decode_int(&decryptor.decrypt(&sum).unwrap()).unwrap();
    for i in 0..16 {
        assert_eq!(decoded[i], a[i] + b[i]);
    }

    let product = evaluator.multiply(&ct_a, &ct_b).unwrap();
    assert_eq!(product.size(), 3);
    let relinearized = evaluator.relinearize(&product, &relin).unwrap();
    assert_eq!(relinearized.size(), 2);
    let decoded = encoder
        .decode_int(&decryptor.decrypt(&relinearized).unwrap())
        .unwrap();
    for i in 0..16 {
        assert_eq!(decoded[i], a[i] * b[i]);
    }

    // Noise grows along the way but the budget never goes negative.
    let fresh = decryptor.invariant_noise_budget(&ct_a).unwrap();
    let spent = decryptor.invariant_noise_budget(&relinearized).unwrap();
    assert!(spent < fresh);
}

#[test]
fn independent_generators_make_distinct_keys() {
    let context = context();
    let first = KeyGenerator::new(&context).unwrap();
    let second = KeyGenerator::new(&context).unwrap();
    assert_ne!(
        first.secret_key().as_bytes().unwrap(),
        second.secret_key().as_bytes().unwrap()
    );

    let rebuilt =
        KeyGenerator::from_secret_key(&context, first.secret_key().clone()).unwrap();
    assert_eq!(
        rebuilt.secret_key().as_bytes().unwrap(),
        first.secret_key().as_bytes().unwrap()
    );
}

#[test]
fn persisted_context_is_behaviorally_identical() {
    // A four-prime chain with a raw (non-prime) plain modulus constant.
    let parms = BfvEncryptionParametersBuilder::new()
        .set_poly_modulus_degree(1024)
        .set_coefficient_modulus(CoefficientModulus::create(1024, &[60, 40, 40, 60]).unwrap())
        .set_plain_modulus(1234u64)
        .build()
        .unwrap();
    assert_eq!(parms.coeff_modulus().len(), 4);
    let context = Context::new(&parms, true, SecurityLevel::None).unwrap();

    let restored = Context::from_bytes(&(), &context.as_bytes().unwrap()).unwrap();
    let restored_parms = restored.encryption_parameters();
    assert_eq!(restored_parms.scheme(), parms.scheme());
    assert_eq!(restored_parms.poly_modulus_degree(), 1024);
    assert_eq!(restored_parms.coeff_modulus(), parms.coeff_modulus());
    assert_eq!(restored_parms.plain_modulus().unwrap().value(), 1234);
    assert_eq!(restored.key_parms_id(), context.key_parms_id());
    assert_eq!(restored.last_parms_id(), context.last_parms_id());
    assert_ne!(restored.key_parms_id(), restored.last_parms_id());
}

#[test]
fn symmetric_and_asymmetric_encryption_interoperate() {
    let context = context();
    let mut rng = ChaCha20Rng::seed_from_u64(1002);
    let generator = KeyGenerator::new_with_rng(&context, &mut rng).unwrap();
    let encoder = BfvEncoder::new(&context).unwrap();
    let evaluator = BfvEvaluator::new(&context).unwrap();
    let decryptor = Decryptor::new(&context, generator.secret_key().clone()).unwrap();

    let asymmetric = Encryptor::with_public_key(
        &context,
        generator.create_public_key_with_rng(&mut rng),
    )
    .unwrap();
    let symmetric =
        Encryptor::with_secret_key(&context, generator.secret_key().clone()).unwrap();

    let ct_a = asymmetric
        .encrypt_with_rng(&encoder.encode_int(&[7, 7, 7]).unwrap(), &mut rng)
        .unwrap();
    let ct_b = symmetric
        .encrypt_with_rng(&encoder.encode_int(&[1, 2, 3]).unwrap(), &mut rng)
        .unwrap();

    let sum = evaluator.add(&ct_a, &ct_b).unwrap();
    let decoded = encoder.decode_int(&decryptor.decrypt(&sum).unwrap()).unwrap();
    assert_eq!(&decoded[..3], &[8, 9, 10]);
}
