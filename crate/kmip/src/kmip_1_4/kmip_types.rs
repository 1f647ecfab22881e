#![allow(non_camel_case_types)]

use std::fmt;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, FromRepr};

use crate::ttlv::TtlvError;

/// Shared behaviour of the KMIP enumerations: conversion to and from the
/// 32 bits value carried by a TTLV `Enumeration` item.
pub trait KmipEnum: Sized + Copy + fmt::Display {
    fn to_u32(self) -> u32;
    fn from_u32(value: u32) -> Option<Self>;
}

/// Implement [`KmipEnum`] for `#[repr(u32)]` enums deriving `FromRepr`
macro_rules! kmip_enum {
    ($($name:ident),+ $(,)?) => {
        $(
            impl KmipEnum for $name {
                #[allow(clippy::as_conversions)]
                // idiomatic for items marked with #[repr(u32)]
                fn to_u32(self) -> u32 {
                    self as u32
                }

                fn from_u32(value: u32) -> Option<Self> {
                    Self::from_repr(value)
                }
            }

            impl Serialize for $name {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.collect_str(self)
                }
            }
        )+
    };
}

/// KMIP 1.4 tags
#[derive(Debug, Display, EnumString, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Tag {
    ActivationDate = 0x42_0001,
    ApplicationData = 0x42_0002,
    ApplicationNamespace = 0x42_0003,
    ApplicationSpecificInformation = 0x42_0004,
    ArchiveDate = 0x42_0005,
    AsynchronousCorrelationValue = 0x42_0006,
    AsynchronousIndicator = 0x42_0007,
    Attribute = 0x42_0008,
    AttributeIndex = 0x42_0009,
    AttributeName = 0x42_000A,
    AttributeValue = 0x42_000B,
    Authentication = 0x42_000C,
    BatchCount = 0x42_000D,
    BatchErrorContinuationOption = 0x42_000E,
    BatchItem = 0x42_000F,
    BatchOrderOption = 0x42_0010,
    BlockCipherMode = 0x42_0011,
    CancellationResult = 0x42_0012,
    Certificate = 0x42_0013,
    CertificateRequest = 0x42_0018,
    CertificateRequestType = 0x42_0019,
    CertificateType = 0x42_001D,
    CertificateValue = 0x42_001E,
    CommonTemplateAttribute = 0x42_001F,
    CompromiseDate = 0x42_0020,
    CompromiseOccurrenceDate = 0x42_0021,
    ContactInformation = 0x42_0022,
    Credential = 0x42_0023,
    CredentialType = 0x42_0024,
    CredentialValue = 0x42_0025,
    CriticalityIndicator = 0x42_0026,
    CRTCoefficient = 0x42_0027,
    CryptographicAlgorithm = 0x42_0028,
    CryptographicDomainParameters = 0x42_0029,
    CryptographicLength = 0x42_002A,
    CryptographicParameters = 0x42_002B,
    CryptographicUsageMask = 0x42_002C,
    D = 0x42_002E,
    DeactivationDate = 0x42_002F,
    DerivationData = 0x42_0030,
    DerivationMethod = 0x42_0031,
    DerivationParameters = 0x42_0032,
    DestroyDate = 0x42_0033,
    Digest = 0x42_0034,
    DigestValue = 0x42_0035,
    EncryptionKeyInformation = 0x42_0036,
    G = 0x42_0037,
    HashingAlgorithm = 0x42_0038,
    InitialDate = 0x42_0039,
    InitializationVector = 0x42_003A,
    IterationCount = 0x42_003C,
    IVCounterNonce = 0x42_003D,
    J = 0x42_003E,
    Key = 0x42_003F,
    KeyBlock = 0x42_0040,
    KeyCompressionType = 0x42_0041,
    KeyFormatType = 0x42_0042,
    KeyMaterial = 0x42_0043,
    KeyPartIdentifier = 0x42_0044,
    KeyValue = 0x42_0045,
    KeyWrappingData = 0x42_0046,
    KeyWrappingSpecification = 0x42_0047,
    LastChangeDate = 0x42_0048,
    LeaseTime = 0x42_0049,
    Link = 0x42_004A,
    LinkType = 0x42_004B,
    LinkedObjectIdentifier = 0x42_004C,
    MACSignature = 0x42_004D,
    MACSignatureKeyInformation = 0x42_004E,
    MaximumItems = 0x42_004F,
    MaximumResponseSize = 0x42_0050,
    MessageExtension = 0x42_0051,
    Modulus = 0x42_0052,
    Name = 0x42_0053,
    NameType = 0x42_0054,
    NameValue = 0x42_0055,
    ObjectGroup = 0x42_0056,
    ObjectType = 0x42_0057,
    Offset = 0x42_0058,
    OpaqueDataType = 0x42_0059,
    OpaqueDataValue = 0x42_005A,
    OpaqueObject = 0x42_005B,
    Operation = 0x42_005C,
    P = 0x42_005E,
    PaddingMethod = 0x42_005F,
    PrimeExponentP = 0x42_0060,
    PrimeExponentQ = 0x42_0061,
    PrimeFieldSize = 0x42_0062,
    PrivateExponent = 0x42_0063,
    PrivateKey = 0x42_0064,
    PrivateKeyTemplateAttribute = 0x42_0065,
    PrivateKeyUniqueIdentifier = 0x42_0066,
    ProcessStartDate = 0x42_0067,
    ProtectStopDate = 0x42_0068,
    ProtocolVersion = 0x42_0069,
    ProtocolVersionMajor = 0x42_006A,
    ProtocolVersionMinor = 0x42_006B,
    PublicExponent = 0x42_006C,
    PublicKey = 0x42_006D,
    PublicKeyTemplateAttribute = 0x42_006E,
    PublicKeyUniqueIdentifier = 0x42_006F,
    PutFunction = 0x42_0070,
    Q = 0x42_0071,
    QString = 0x42_0072,
    Qlength = 0x42_0073,
    QueryFunction = 0x42_0074,
    RecommendedCurve = 0x42_0075,
    ReplacedUniqueIdentifier = 0x42_0076,
    RequestHeader = 0x42_0077,
    RequestMessage = 0x42_0078,
    RequestPayload = 0x42_0079,
    ResponseHeader = 0x42_007A,
    ResponseMessage = 0x42_007B,
    ResponsePayload = 0x42_007C,
    ResultMessage = 0x42_007D,
    ResultReason = 0x42_007E,
    ResultStatus = 0x42_007F,
    RevocationMessage = 0x42_0080,
    RevocationReason = 0x42_0081,
    RevocationReasonCode = 0x42_0082,
    KeyRoleType = 0x42_0083,
    Salt = 0x42_0084,
    SecretData = 0x42_0085,
    SecretDataType = 0x42_0086,
    ServerInformation = 0x42_0088,
    SplitKey = 0x42_0089,
    SplitKeyMethod = 0x42_008A,
    SplitKeyParts = 0x42_008B,
    SplitKeyThreshold = 0x42_008C,
    State = 0x42_008D,
    StorageStatusMask = 0x42_008E,
    SymmetricKey = 0x42_008F,
    Template = 0x42_0090,
    TemplateAttribute = 0x42_0091,
    TimeStamp = 0x42_0092,
    UniqueBatchItemID = 0x42_0093,
    UniqueIdentifier = 0x42_0094,
    UsageLimits = 0x42_0095,
    UsageLimitsCount = 0x42_0096,
    UsageLimitsTotal = 0x42_0097,
    UsageLimitsUnit = 0x42_0098,
    Username = 0x42_0099,
    ValidityDate = 0x42_009A,
    ValidityIndicator = 0x42_009B,
    VendorExtension = 0x42_009C,
    VendorIdentification = 0x42_009D,
    WrappingMethod = 0x42_009E,
    X = 0x42_009F,
    Y = 0x42_00A0,
    Password = 0x42_00A1,
    DeviceIdentifier = 0x42_00A2,
    EncodingOption = 0x42_00A3,
    ExtensionInformation = 0x42_00A4,
    ExtensionName = 0x42_00A5,
    ExtensionTag = 0x42_00A6,
    ExtensionType = 0x42_00A7,
    Fresh = 0x42_00A8,
    MachineIdentifier = 0x42_00A9,
    MediaIdentifier = 0x42_00AA,
    NetworkIdentifier = 0x42_00AB,
    ObjectGroupMember = 0x42_00AC,
    CertificateLength = 0x42_00AD,
    DigitalSignatureAlgorithm = 0x42_00AE,
    CertificateSerialNumber = 0x42_00AF,
    DeviceSerialNumber = 0x42_00B0,
    IssuerAlternativeName = 0x42_00B1,
    IssuerDistinguishedName = 0x42_00B2,
    SubjectAlternativeName = 0x42_00B3,
    SubjectDistinguishedName = 0x42_00B4,
    X509CertificateIdentifier = 0x42_00B5,
    X509CertificateIssuer = 0x42_00B6,
    X509CertificateSubject = 0x42_00B7,
    KeyValueLocation = 0x42_00B8,
    KeyValueLocationValue = 0x42_00B9,
    KeyValueLocationType = 0x42_00BA,
    KeyValuePresent = 0x42_00BB,
    OriginalCreationDate = 0x42_00BC,
    PGPKey = 0x42_00BD,
    PGPKeyVersion = 0x42_00BE,
    AlternativeName = 0x42_00BF,
    AlternativeNameValue = 0x42_00C0,
    AlternativeNameType = 0x42_00C1,
    Data = 0x42_00C2,
    SignatureData = 0x42_00C3,
    DataLength = 0x42_00C4,
    RandomIV = 0x42_00C5,
    MACData = 0x42_00C6,
    AttestationType = 0x42_00C7,
    Nonce = 0x42_00C8,
    NonceID = 0x42_00C9,
    NonceValue = 0x42_00CA,
    AttestationMeasurement = 0x42_00CB,
    AttestationAssertion = 0x42_00CC,
    IVLength = 0x42_00CD,
    TagLength = 0x42_00CE,
    FixedFieldLength = 0x42_00CF,
    CounterLength = 0x42_00D0,
    InitialCounterValue = 0x42_00D1,
    InvocationFieldLength = 0x42_00D2,
    AttestationCapableIndicator = 0x42_00D3,
    OffsetItems = 0x42_00D4,
    LocatedItems = 0x42_00D5,
    CorrelationValue = 0x42_00D6,
    InitIndicator = 0x42_00D7,
    FinalIndicator = 0x42_00D8,
    RNGParameters = 0x42_00D9,
    RNGAlgorithm = 0x42_00DA,
    DRBGAlgorithm = 0x42_00DB,
    FIPS186Variation = 0x42_00DC,
    PredictionResistance = 0x42_00DD,
    RandomNumberGenerator = 0x42_00DE,
    ValidationInformation = 0x42_00DF,
    ValidationAuthorityType = 0x42_00E0,
    ValidationAuthorityCountry = 0x42_00E1,
    ValidationAuthorityURI = 0x42_00E2,
    ValidationVersionMajor = 0x42_00E3,
    ValidationVersionMinor = 0x42_00E4,
    ValidationType = 0x42_00E5,
    ValidationLevel = 0x42_00E6,
    ValidationCertificateIdentifier = 0x42_00E7,
    ValidationCertificateURI = 0x42_00E8,
    ValidationVendorURI = 0x42_00E9,
    ValidationProfile = 0x42_00EA,
    ProfileInformation = 0x42_00EB,
    ProfileName = 0x42_00EC,
    ServerURI = 0x42_00ED,
    ServerPort = 0x42_00EE,
    StreamingCapability = 0x42_00EF,
    AsynchronousCapability = 0x42_00F0,
    AttestationCapability = 0x42_00F1,
    UnwrapMode = 0x42_00F2,
    DestroyAction = 0x42_00F3,
    ShreddingAlgorithm = 0x42_00F4,
    RNGMode = 0x42_00F5,
    ClientRegistrationMethod = 0x42_00F6,
    CapabilityInformation = 0x42_00F7,
    KeyWrapType = 0x42_00F8,
    BatchUndoCapability = 0x42_00F9,
    BatchContinueCapability = 0x42_00FA,
    PKCS12FriendlyName = 0x42_00FB,
    Description = 0x42_00FC,
    Comment = 0x42_00FD,
    AuthenticatedEncryptionAdditionalData = 0x42_00FE,
    AuthenticatedEncryptionTag = 0x42_00FF,
    SaltLength = 0x42_0100,
    MaskGenerator = 0x42_0101,
    MaskGeneratorHashingAlgorithm = 0x42_0102,
    PSource = 0x42_0103,
    TrailerField = 0x42_0104,
    ClientCorrelationValue = 0x42_0105,
    ServerCorrelationValue = 0x42_0106,
    DigestedData = 0x42_0107,
    CertificateSubjectCN = 0x42_0108,
    CertificateSubjectO = 0x42_0109,
    CertificateSubjectOU = 0x42_010A,
    CertificateSubjectEmail = 0x42_010B,
    CertificateSubjectC = 0x42_010C,
    CertificateSubjectST = 0x42_010D,
    CertificateSubjectL = 0x42_010E,
    CertificateSubjectUID = 0x42_010F,
    CertificateSubjectSerialNumber = 0x42_0110,
    CertificateSubjectTitle = 0x42_0111,
    CertificateSubjectDC = 0x42_0112,
    CertificateSubjectDNQualifier = 0x42_0113,
    CertificateIssuerCN = 0x42_0114,
    CertificateIssuerO = 0x42_0115,
    CertificateIssuerOU = 0x42_0116,
    CertificateIssuerEmail = 0x42_0117,
    CertificateIssuerC = 0x42_0118,
    CertificateIssuerST = 0x42_0119,
    CertificateIssuerL = 0x42_011A,
    CertificateIssuerUID = 0x42_011B,
    CertificateIssuerSerialNumber = 0x42_011C,
    CertificateIssuerTitle = 0x42_011D,
    CertificateIssuerDC = 0x42_011E,
    CertificateIssuerDNQualifier = 0x42_011F,
    Sensitive = 0x42_0120,
    AlwaysSensitive = 0x42_0121,
    Extractable = 0x42_0122,
    NeverExtractable = 0x42_0123,
    ReplaceExisting = 0x42_0124,
    Attributes = 0x42_0125,
    CommonAttributes = 0x42_0126,
    PrivateKeyAttributes = 0x42_0127,
    PublicKeyAttributes = 0x42_0128,
    ExtensionEnumeration = 0x42_0129,
    ExtensionAttribute = 0x42_012A,
    ExtensionParentStructureTag = 0x42_012B,
    ExtensionDescription = 0x42_012C,
    ServerName = 0x42_012D,
    ServerSerialNumber = 0x42_012E,
    ServerVersion = 0x42_012F,
    ServerLoad = 0x42_0130,
    ProductName = 0x42_0131,
    BuildLevel = 0x42_0132,
    BuildDate = 0x42_0133,
    ClusterInfo = 0x42_0134,
    AlternateFailoverEndpoints = 0x42_0135,
    ShortUniqueIdentifier = 0x42_0136,
    Reserved = 0x42_0137,
    Tag = 0x42_0138,
    CertificateRequestUniqueIdentifier = 0x42_0139,
    NISTKeyType = 0x42_013A,
    AttributeReference = 0x42_013B,
    CurrentAttribute = 0x42_013C,
    NewAttribute = 0x42_013D,
}

impl Tag {
    pub fn from_u32(tag_value: u32) -> Result<Self, TtlvError> {
        Self::from_repr(tag_value)
            .ok_or_else(|| TtlvError::from(format!("Unknown tag: 0x{tag_value:06X}")))
    }

    #[allow(clippy::as_conversions)]
    // idiomatic for items marked with #[repr(u32)]
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    /// The tag of the attribute value type named by a KMIP 1.4 attribute
    /// name, e.g. `Cryptographic Algorithm`. Custom `x-` attributes have none.
    #[must_use]
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        name.replace(' ', "").parse().ok()
    }
}

/// KMIP 1.4 Object Type Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
#[repr(u32)]
pub enum ObjectType {
    Certificate = 0x1,
    SymmetricKey = 0x2,
    PublicKey = 0x3,
    PrivateKey = 0x4,
    SplitKey = 0x5,
    Template = 0x6,
    SecretData = 0x7,
    OpaqueObject = 0x8,
    PGPKey = 0x9,
}

/// KMIP 1.4 State Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
#[repr(u32)]
pub enum State {
    PreActive = 0x1,
    Active = 0x2,
    Deactivated = 0x3,
    Compromised = 0x4,
    Destroyed = 0x5,
    DestroyedCompromised = 0x6,
}

/// KMIP 1.4 Revocation Reason Code Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
#[repr(u32)]
pub enum RevocationReasonCode {
    Unspecified = 0x1,
    KeyCompromise = 0x2,
    CACompromise = 0x3,
    AffiliationChanged = 0x4,
    Superseded = 0x5,
    CessationOfOperation = 0x6,
    PrivilegeWithdrawn = 0x7,
}

/// KMIP 1.4 Cryptographic Algorithm Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
#[repr(u32)]
pub enum CryptographicAlgorithm {
    DES = 0x1,
    TDES = 0x2,
    AES = 0x3,
    RSA = 0x4,
    DSA = 0x5,
    ECDSA = 0x6,
    HMACSHA1 = 0x7,
    HMACSHA224 = 0x8,
    HMACSHA256 = 0x9,
    HMACSHA384 = 0xA,
    HMACSHA512 = 0xB,
    HMACMD5 = 0xC,
    DH = 0xD,
    ECDH = 0xE,
    ECMQV = 0xF,
    Blowfish = 0x10,
    Camellia = 0x11,
    CAST5 = 0x12,
    IDEA = 0x13,
    MARS = 0x14,
    RC2 = 0x15,
    RC4 = 0x16,
    RC5 = 0x17,
    SKIPJACK = 0x18,
    Twofish = 0x19,
    EC = 0x1A,
    OneTimePad = 0x1B,
    ChaCha20 = 0x1C,
    Poly1305 = 0x1D,
    ChaCha20Poly1305 = 0x1E,
    SHA3224 = 0x1F,
    SHA3256 = 0x20,
    SHA3384 = 0x21,
    SHA3512 = 0x22,
    HMACSHA3224 = 0x23,
    HMACSHA3256 = 0x24,
    HMACSHA3384 = 0x25,
    HMACSHA3512 = 0x26,
    SHAKE128 = 0x27,
    SHAKE256 = 0x28,
}

/// KMIP 1.4 Recommended Curve Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(ascii_case_insensitive)]
#[repr(u32)]
pub enum RecommendedCurve {
    #[strum(serialize = "P-192")]
    P192 = 0x1,
    #[strum(serialize = "K-163")]
    K163 = 0x2,
    #[strum(serialize = "B-163")]
    B163 = 0x3,
    #[strum(serialize = "P-224")]
    P224 = 0x4,
    #[strum(serialize = "K-233")]
    K233 = 0x5,
    #[strum(serialize = "B-233")]
    B233 = 0x6,
    #[strum(serialize = "P-256")]
    P256 = 0x7,
    #[strum(serialize = "K-283")]
    K283 = 0x8,
    #[strum(serialize = "B-283")]
    B283 = 0x9,
    #[strum(serialize = "P-384")]
    P384 = 0xA,
    #[strum(serialize = "K-409")]
    K409 = 0xB,
    #[strum(serialize = "B-409")]
    B409 = 0xC,
    #[strum(serialize = "P-521")]
    P521 = 0xD,
    #[strum(serialize = "K-571")]
    K571 = 0xE,
    #[strum(serialize = "B-571")]
    B571 = 0xF,
    CURVE25519 = 0x3C,
    CURVE448 = 0x3D,
}

impl RecommendedCurve {
    /// Field size in bits of the NIST prime curves, used as key length
    #[must_use]
    pub const fn bit_length(self) -> Option<i32> {
        match self {
            Self::P192 => Some(192),
            Self::P224 => Some(224),
            Self::P256 => Some(256),
            Self::P384 => Some(384),
            Self::P521 => Some(521),
            _ => None,
        }
    }
}

/// KMIP 1.4 Name Type Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NameType {
    UninterpretedTextString = 0x1,
    URI = 0x2,
}

/// KMIP 1.4 Link Type Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LinkType {
    CertificateLink = 0x101,
    PublicKeyLink = 0x102,
    PrivateKeyLink = 0x103,
    DerivationBaseObjectLink = 0x104,
    DerivedKeyLink = 0x105,
    ReplacementObjectLink = 0x106,
    ReplacedObjectLink = 0x107,
    ParentLink = 0x108,
    ChildLink = 0x109,
    PreviousLink = 0x10A,
    NextLink = 0x10B,
    PKCS12CertificateLink = 0x10C,
    PKCS12PasswordLink = 0x10D,
}

/// KMIP 1.4 Key Format Type Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum KeyFormatType {
    Raw = 0x1,
    Opaque = 0x2,
    PKCS1 = 0x3,
    PKCS8 = 0x4,
    X509 = 0x5,
    ECPrivateKey = 0x6,
    TransparentSymmetricKey = 0x7,
    TransparentDSAPrivateKey = 0x8,
    TransparentDSAPublicKey = 0x9,
    TransparentRSAPrivateKey = 0xA,
    TransparentRSAPublicKey = 0xB,
    TransparentDHPrivateKey = 0xC,
    TransparentDHPublicKey = 0xD,
    TransparentECDSAPrivateKey = 0xE,
    TransparentECDSAPublicKey = 0xF,
    TransparentECDHPrivateKey = 0x10,
    TransparentECDHPublicKey = 0x11,
    TransparentECMQVPrivateKey = 0x12,
    TransparentECMQVPublicKey = 0x13,
    TransparentECPrivateKey = 0x14,
    TransparentECPublicKey = 0x15,
    PKCS12 = 0x16,
}

/// KMIP 1.4 Operation Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Operation {
    Create = 0x1,
    CreateKeyPair = 0x2,
    Register = 0x3,
    ReKey = 0x4,
    DeriveKey = 0x5,
    Certify = 0x6,
    ReCertify = 0x7,
    Locate = 0x8,
    Check = 0x9,
    Get = 0xA,
    GetAttributes = 0xB,
    GetAttributeList = 0xC,
    AddAttribute = 0xD,
    ModifyAttribute = 0xE,
    DeleteAttribute = 0xF,
    ObtainLease = 0x10,
    GetUsageAllocation = 0x11,
    Activate = 0x12,
    Revoke = 0x13,
    Destroy = 0x14,
    Archive = 0x15,
    Recover = 0x16,
    Validate = 0x17,
    Query = 0x18,
    Cancel = 0x19,
    Poll = 0x1A,
    Notify = 0x1B,
    Put = 0x1C,
    ReKeyKeyPair = 0x1D,
    DiscoverVersions = 0x1E,
    Encrypt = 0x1F,
    Decrypt = 0x20,
    Sign = 0x21,
    SignatureVerify = 0x22,
    MAC = 0x23,
    MACVerify = 0x24,
    RNGRetrieve = 0x25,
    RNGSeed = 0x26,
    Hash = 0x27,
    CreateSplitKey = 0x28,
    JoinSplitKey = 0x29,
    Import = 0x2A,
    Export = 0x2B,
}

/// KMIP 1.4 Result Status Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResultStatus {
    Success = 0x0,
    OperationFailed = 0x1,
    OperationPending = 0x2,
    OperationUndone = 0x3,
}

/// KMIP 1.4 Result Reason Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResultReason {
    ItemNotFound = 0x1,
    ResponseTooLarge = 0x2,
    AuthenticationNotSuccessful = 0x3,
    InvalidMessage = 0x4,
    OperationNotSupported = 0x5,
    MissingData = 0x6,
    InvalidField = 0x7,
    FeatureNotSupported = 0x8,
    OperationCanceledByRequester = 0x9,
    CryptographicFailure = 0xA,
    IllegalOperation = 0xB,
    PermissionDenied = 0xC,
    ObjectArchived = 0xD,
    IndexOutOfBounds = 0xE,
    ApplicationNamespaceNotSupported = 0xF,
    KeyFormatTypeNotSupported = 0x10,
    KeyCompressionTypeNotSupported = 0x11,
    EncodingOptionError = 0x12,
    KeyValueNotPresent = 0x13,
    AttestationRequired = 0x14,
    AttestationFailed = 0x15,
    Sensitive = 0x16,
    NotExtractable = 0x17,
    ObjectAlreadyExists = 0x18,
    GeneralFailure = 0x100,
}

/// KMIP 1.4 Certificate Type Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CertificateType {
    X509 = 0x1,
    PGP = 0x2,
}

/// KMIP 1.4 Secret Data Type Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SecretDataType {
    Password = 0x1,
    Seed = 0x2,
}

/// KMIP 1.4 Hashing Algorithm Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HashingAlgorithm {
    MD2 = 0x1,
    MD4 = 0x2,
    MD5 = 0x3,
    SHA1 = 0x4,
    SHA224 = 0x5,
    SHA256 = 0x6,
    SHA384 = 0x7,
    SHA512 = 0x8,
    RIPEMD160 = 0x9,
    Tiger = 0xA,
    Whirlpool = 0xB,
    SHA512224 = 0xC,
    SHA512256 = 0xD,
    SHA3224 = 0xE,
    SHA3256 = 0xF,
    SHA3384 = 0x10,
    SHA3512 = 0x11,
}

/// KMIP 1.4 Block Cipher Mode Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BlockCipherMode {
    CBC = 0x1,
    ECB = 0x2,
    PCBC = 0x3,
    CFB = 0x4,
    OFB = 0x5,
    CTR = 0x6,
    CMAC = 0x7,
    CCM = 0x8,
    GCM = 0x9,
    CBCMAC = 0xA,
    XTS = 0xB,
    AESKeyWrapPadding = 0xC,
    NISTKeyWrap = 0xD,
    X9102AESKW = 0xE,
    X9102TDKW = 0xF,
    X9102AKW1 = 0x10,
    X9102AKW2 = 0x11,
    AEAD = 0x12,
}

/// KMIP 1.4 Padding Method Enumeration
#[derive(Debug, Display, EnumString, EnumIter, FromRepr, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PaddingMethod {
    #[strum(serialize = "None")]
    NoPadding = 0x1,
    OAEP = 0x2,
    PKCS5 = 0x3,
    SSL3 = 0x4,
    Zeros = 0x5,
    ANSIX923 = 0x6,
    ISO10126 = 0x7,
    PKCS1v15 = 0x8,
    X931 = 0x9,
    PSS = 0xA,
}

kmip_enum!(
    ObjectType,
    State,
    RevocationReasonCode,
    CryptographicAlgorithm,
    RecommendedCurve,
    NameType,
    LinkType,
    KeyFormatType,
    Operation,
    ResultStatus,
    ResultReason,
    CertificateType,
    SecretDataType,
    HashingAlgorithm,
    BlockCipherMode,
    PaddingMethod,
);

/// Name of the enumeration variant carried by an item with the given tag
#[must_use]
pub fn enum_name(tag: Tag, value: u32) -> Option<String> {
    fn name<E: KmipEnum>(value: u32) -> Option<String> {
        E::from_u32(value).map(|e| e.to_string())
    }
    match tag {
        Tag::ObjectType => name::<ObjectType>(value),
        Tag::State => name::<State>(value),
        Tag::RevocationReasonCode => name::<RevocationReasonCode>(value),
        Tag::CryptographicAlgorithm => name::<CryptographicAlgorithm>(value),
        Tag::RecommendedCurve => name::<RecommendedCurve>(value),
        Tag::NameType => name::<NameType>(value),
        Tag::LinkType => name::<LinkType>(value),
        Tag::KeyFormatType => name::<KeyFormatType>(value),
        Tag::Operation => name::<Operation>(value),
        Tag::ResultStatus => name::<ResultStatus>(value),
        Tag::ResultReason => name::<ResultReason>(value),
        Tag::CertificateType => name::<CertificateType>(value),
        Tag::SecretDataType => name::<SecretDataType>(value),
        Tag::HashingAlgorithm => name::<HashingAlgorithm>(value),
        Tag::BlockCipherMode => name::<BlockCipherMode>(value),
        Tag::PaddingMethod => name::<PaddingMethod>(value),
        _ => None,
    }
}

/// KMIP 1.4 Cryptographic Usage Mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CryptographicUsageMask(u32);

bitflags::bitflags! {
    impl CryptographicUsageMask: u32 {
        const Sign = 0x0000_0001;
        const Verify = 0x0000_0002;
        const Encrypt = 0x0000_0004;
        const Decrypt = 0x0000_0008;
        const WrapKey = 0x0000_0010;
        const UnwrapKey = 0x0000_0020;
        const Export = 0x0000_0040;
        const MACGenerate = 0x0000_0080;
        const MACVerify = 0x0000_0100;
        const DeriveKey = 0x0000_0200;
        const ContentCommitment = 0x0000_0400;
        const KeyAgreement = 0x0000_0800;
        const CertificateSign = 0x0000_1000;
        const CRLSign = 0x0000_2000;
        const GenerateCryptogram = 0x0000_4000;
        const ValidateCryptogram = 0x0000_8000;
        const TranslateEncrypt = 0x0001_0000;
        const TranslateDecrypt = 0x0002_0000;
        const TranslateWrap = 0x0004_0000;
        const TranslateUnwrap = 0x0008_0000;
    }
}

impl fmt::Display for CryptographicUsageMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, _flag) in self.iter_names() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        let unknown = self.bits() & !Self::all().bits();
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "0x{unknown:08X}")?;
        }
        Ok(())
    }
}

impl Serialize for CryptographicUsageMask {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::{
        CryptographicAlgorithm, CryptographicUsageMask, KmipEnum, ObjectType, RecommendedCurve,
        Tag, enum_name,
    };

    #[test]
    fn test_tag_values() {
        assert_eq!(Tag::Link.to_u32(), 0x42_004A);
        assert_eq!(Tag::from_str("ObjectType").unwrap().to_u32(), 0x42_0057);
        assert_eq!(Tag::from_u32(0x42_0105).unwrap(), Tag::ClientCorrelationValue);
        Tag::from_u32(0x54_0000).unwrap_err();
    }

    #[test]
    fn test_tag_from_attribute_name() {
        assert_eq!(
            Tag::from_attribute_name("Cryptographic Usage Mask"),
            Some(Tag::CryptographicUsageMask)
        );
        assert_eq!(Tag::from_attribute_name("x-custom"), None);
    }

    #[test]
    fn test_enum_round_trip_through_u32() {
        for object_type in ObjectType::iter() {
            assert_eq!(
                ObjectType::from_u32(object_type.to_u32()),
                Some(object_type)
            );
        }
        assert_eq!(CryptographicAlgorithm::from_u32(0x18), Some(CryptographicAlgorithm::SKIPJACK));
    }

    #[test]
    fn test_curve_names() {
        assert_eq!(RecommendedCurve::P256.to_string(), "P-256");
        assert_eq!(RecommendedCurve::from_str("p-384").unwrap(), RecommendedCurve::P384);
        assert_eq!(RecommendedCurve::P521.bit_length(), Some(521));
    }

    #[test]
    fn test_enum_name_by_tag() {
        assert_eq!(enum_name(Tag::State, 2).as_deref(), Some("Active"));
        assert_eq!(enum_name(Tag::LinkType, 0x102).as_deref(), Some("PublicKeyLink"));
        assert_eq!(enum_name(Tag::State, 0x99), None);
        assert_eq!(enum_name(Tag::NameValue, 1), None);
    }

    #[test]
    fn test_usage_mask_display() {
        let mask = CryptographicUsageMask::Sign | CryptographicUsageMask::Verify;
        assert_eq!(mask.to_string(), "Sign | Verify");
        assert_eq!(
            CryptographicUsageMask::from_bits_retain(0x8000_0001).to_string(),
            "Sign | 0x80000000"
        );
        assert_eq!(CryptographicUsageMask::empty().to_string(), "");
    }
}
